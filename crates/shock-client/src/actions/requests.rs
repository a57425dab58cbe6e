use serde_json::{json, Value};
use tracing::info;

use super::{logged, Actions};
use crate::error::{ClientError, Result};

impl Actions {
    /// Accept the received request with server id `request_id`.
    pub async fn accept_request(&self, request_id: &str) -> Result<()> {
        let result = async {
            self.api
                .put(
                    &format!("/api/gun/requests/{request_id}"),
                    &json!({ "accept": true }),
                )
                .await?
                .ensure_success()?;
            Ok::<_, ClientError>(())
        }
        .await;

        if result.is_ok() {
            info!(request_id, "accepted contact request");
        }
        logged("accept_request", result)
    }

    /// Ask `recipient_public_key` to become a contact. Returns the node's
    /// answer.
    pub async fn send_handshake_request(&self, recipient_public_key: &str) -> Result<Value> {
        let result = async {
            let response = self
                .api
                .post(
                    "/api/gun/requests",
                    &json!({ "publicKey": recipient_public_key }),
                )
                .await?
                .ensure_success()?;
            Ok::<_, ClientError>(response.body)
        }
        .await;

        logged("send_handshake_request", result)
    }

    /// Contact request carrying a first message. Returns the created request
    /// as the node describes it.
    pub async fn send_req_with_initial_msg(
        &self,
        recipient_public_key: &str,
        initial_msg: &str,
    ) -> Result<Value> {
        let result = async {
            let response = self
                .api
                .post(
                    "/api/gun/requests",
                    &json!({
                        "publicKey": recipient_public_key,
                        "initialMsg": initial_msg,
                    }),
                )
                .await?
                .ensure_success()?;
            Ok::<_, ClientError>(response.body)
        }
        .await;

        logged("send_req_with_initial_msg", result)
    }
}
