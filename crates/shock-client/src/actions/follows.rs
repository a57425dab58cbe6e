use serde_json::json;
use tracing::info;

use shock_shared::constants::NO_SERVER_MESSAGE;

use super::{logged, Actions};
use crate::error::{ClientError, RemoteOperationError, Result};
use crate::http::ApiResponse;

/// Rewrite a rejection into the user-facing follow failure message.
/// Transport failures and timeouts pass through untouched.
fn describe(
    response: ApiResponse,
    verb: &str,
    public_key: &str,
) -> std::result::Result<ApiResponse, RemoteOperationError> {
    if response.status == 200 {
        return Ok(response);
    }
    let reason = response.error_message().unwrap_or(NO_SERVER_MESSAGE);
    Err(RemoteOperationError::Rejected {
        status: response.status,
        message: format!("Could not {verb} publicKey: {public_key} due to : {reason}"),
    })
}

impl Actions {
    pub async fn follow(&self, public_key: &str) -> Result<()> {
        let result = async {
            let response = self
                .api
                .put(&format!("/api/gun/follows/{public_key}"), &json!({}))
                .await?;
            describe(response, "follow", public_key)?;
            info!(public_key, "followed");
            Ok::<_, ClientError>(())
        }
        .await;

        logged("follow", result)
    }

    pub async fn unfollow(&self, public_key: &str) -> Result<()> {
        let result = async {
            let response = self
                .api
                .delete(&format!("/api/gun/follows/{public_key}"))
                .await?;
            describe(response, "UN-follow", public_key)?;
            info!(public_key, "unfollowed");
            Ok::<_, ClientError>(())
        }
        .await;

        logged("unfollow", result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::actions::testing::harness;

    #[tokio::test]
    async fn test_follow() {
        let h = harness(200, json!({})).await;
        h.actions.follow("their-pub").await.unwrap();

        let call = h.api.last_call();
        assert_eq!(call.method, "PUT");
        assert_eq!(call.path, "/api/gun/follows/their-pub");
        assert_eq!(call.body, json!({}));
    }

    #[tokio::test]
    async fn test_unfollow() {
        let h = harness(200, json!({})).await;
        h.actions.unfollow("their-pub").await.unwrap();

        let call = h.api.last_call();
        assert_eq!(call.method, "DELETE");
        assert_eq!(call.path, "/api/gun/follows/their-pub");
    }

    #[tokio::test]
    async fn test_follow_failure_messages() {
        let h = harness(500, json!({"errorMessage": "already following"})).await;
        let err = h.actions.follow("pk1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not follow publicKey: pk1 due to : already following"
        );

        h.api.respond_with(500, json!({}));
        let err = h.actions.unfollow("pk1").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Could not UN-follow publicKey: pk1 due to : {NO_SERVER_MESSAGE}")
        );
    }

    #[tokio::test]
    async fn test_created_is_not_ok() {
        let h = harness(201, json!({})).await;
        assert!(h.actions.follow("pk1").await.is_err());
    }
}
