use serde_json::{json, Value};
use tracing::{debug, warn};

use shock_shared::types::PartialUser;

use super::{logged, Actions};
use crate::error::{ClientError, Result};

impl Actions {
    /// Publish a post. Whatever the post says about its author is merged
    /// into the user directory.
    pub async fn add_post(&self, post: Value) -> Result<Value> {
        let result = async {
            let response = self
                .api
                .post("/api/gun/addpost", &json!({ "post": &post }))
                .await?
                .ensure_success()?;
            Ok::<_, ClientError>(response.body)
        }
        .await;

        if result.is_ok() {
            self.merge_author(&post);
        }
        logged("add_post", result)
    }

    fn merge_author(&self, post: &Value) {
        let Some(author) = post.get("author") else {
            return;
        };
        match serde_json::from_value::<PartialUser>(author.clone()) {
            Ok(author) => {
                debug!(public_key = %author.public_key, "merging post author");
                self.mirror.users().receive([&author]);
            }
            Err(e) => warn!(error = %e, "post author is not a user record"),
        }
    }
}
