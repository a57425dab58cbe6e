use serde_json::{json, Value};
use tracing::info;

use super::{logged, Actions};
use crate::error::Result;

impl Actions {
    pub async fn set_avatar(&self, avatar: &str) -> Result<()> {
        logged("set_avatar", self.update_me(json!({ "avatar": avatar })).await)
    }

    pub async fn set_display_name(&self, display_name: &str) -> Result<()> {
        logged(
            "set_display_name",
            self.update_me(json!({ "displayName": display_name })).await,
        )
    }

    /// The new bio reaches the mirror through the next `ON_BIO` push.
    pub async fn set_bio(&self, bio: &str) -> Result<()> {
        logged("set_bio", self.update_me(json!({ "bio": bio })).await)
    }

    async fn update_me(&self, fields: Value) -> Result<()> {
        self.api.put("/api/gun/me", &fields).await?.ensure_success()?;
        info!(?fields, "profile updated");
        Ok(())
    }
}
