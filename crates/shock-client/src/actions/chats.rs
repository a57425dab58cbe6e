use serde_json::json;
use tracing::{debug, info};

use shock_shared::types::{Chat, ChatMessage};

use super::{logged, Actions};
use crate::error::{ClientError, Result};

/// Compensating record for an optimistic chat removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRemoval {
    pub chat: Chat,
    /// Position the chat held before it was removed.
    pub index: usize,
}

impl Actions {
    /// Send `body` to `recipient_public_key`, returning the stored message.
    pub async fn send_message_new(
        &self,
        recipient_public_key: &str,
        body: &str,
    ) -> Result<ChatMessage> {
        let result = async {
            let message = self
                .api
                .post(
                    &format!("/api/gun/chats/{recipient_public_key}"),
                    &json!({ "body": body }),
                )
                .await?
                .ensure_success()?
                .json::<ChatMessage>()?;
            Ok::<_, ClientError>(message)
        }
        .await;

        logged("send_message", result)
    }

    /// Like [`Actions::send_message_new`] but only returns the message id.
    pub async fn send_message(&self, recipient_public_key: &str, body: &str) -> Result<String> {
        let message = self.send_message_new(recipient_public_key, body).await?;
        Ok(message.id)
    }

    /// End the conversation with `recipient_public_key`.
    ///
    /// The chat leaves the mirror before the node is asked. If the call
    /// fails it is appended back at the end of the list, unless a push has
    /// restored it in the meantime.
    pub async fn disconnect(&self, recipient_public_key: &str) -> Result<()> {
        let removal = self.remove_chat(recipient_public_key);
        if removal.is_none() {
            debug!(recipient_public_key, "no local chat to remove");
        }

        let result = async {
            self.api
                .delete(&format!("/api/gun/chats/{recipient_public_key}"))
                .await?
                .ensure_ok()?;
            Ok::<_, ClientError>(())
        }
        .await;

        match (&result, removal) {
            (Ok(()), _) => info!(recipient_public_key, "disconnected from contact"),
            (Err(_), Some(removal)) => self.restore_chat(removal),
            (Err(_), None) => {}
        }
        logged("disconnect", result)
    }

    fn remove_chat(&self, recipient_public_key: &str) -> Option<ChatRemoval> {
        let mut removal = None;
        self.mirror.chats().update(|chats| {
            let index = chats
                .iter()
                .position(|c| c.recipient_public_key == recipient_public_key)?;
            let mut next = chats.clone();
            let chat = next.remove(index);
            removal = Some(ChatRemoval { chat, index });
            Some(next)
        });
        removal
    }

    fn restore_chat(&self, removal: ChatRemoval) {
        let key = removal.chat.recipient_public_key.clone();
        let restored = self.mirror.chats().update(|chats| {
            if chats.iter().any(|c| c.recipient_public_key == key) {
                return None;
            }
            let mut next = chats.clone();
            next.push(removal.chat);
            Some(next)
        });
        debug!(
            recipient_public_key = %key,
            previous_index = removal.index,
            restored,
            "rolled back chat removal"
        );
    }
}
