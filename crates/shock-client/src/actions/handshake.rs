use serde_json::json;
use tracing::info;

use shock_shared::protocol::{GENERATE_NEW_HANDSHAKE_NODE, ON_SENT_REQUESTS};

use super::{logged, Actions};
use crate::error::{ClientError, Result};

impl Actions {
    /// Ask the node to rotate the handshake address. The new address
    /// arrives as an `ON_HANDSHAKE_ADDRESS` push.
    pub fn generate_new_handshake_node(&self) -> Result<()> {
        logged(
            "generate_new_handshake_node",
            self.emit_with_token(GENERATE_NEW_HANDSHAKE_NODE),
        )?;
        info!("requested a new handshake node");
        Ok(())
    }

    /// Ask the node to push the current sent-requests snapshot.
    pub fn request_sent_requests(&self) -> Result<()> {
        logged(
            "request_sent_requests",
            self.emit_with_token(ON_SENT_REQUESTS),
        )
    }

    fn emit_with_token(&self, event: &str) -> Result<()> {
        let token = self.cache.get_token()?;
        if !self.connection.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.connection.emit(event, json!({ "token": token }));
        Ok(())
    }
}
