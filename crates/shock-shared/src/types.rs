use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// A known user, keyed by public key.
///
/// Records only ever gain information: see [`User::merge`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub public_key: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    /// Epoch millis of the user's last app activity.
    #[serde(default)]
    pub last_seen_app: u64,
    /// Epoch millis of the user's node last being online.
    #[serde(default)]
    pub last_seen_node: u64,
}

impl User {
    /// The placeholder record for a key nothing is known about yet.
    pub fn empty(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            display_name: None,
            avatar: None,
            bio: None,
            last_seen_app: 0,
            last_seen_node: 0,
        }
    }

    /// Apply the fields present in `partial`. Absent fields keep their
    /// current value.
    pub fn merge(&mut self, partial: &PartialUser) {
        if let Some(ref name) = partial.display_name {
            self.display_name = Some(name.clone());
        }
        if let Some(ref avatar) = partial.avatar {
            self.avatar = Some(avatar.clone());
        }
        if let Some(ref bio) = partial.bio {
            self.bio = Some(bio.clone());
        }
        if let Some(ts) = partial.last_seen_app {
            self.last_seen_app = ts;
        }
        if let Some(ts) = partial.last_seen_node {
            self.last_seen_node = ts;
        }
    }
}

/// Whatever a single source knows about a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartialUser {
    pub public_key: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub last_seen_app: Option<u64>,
    pub last_seen_node: Option<u64>,
}

impl PartialUser {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Chats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub body: String,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub outgoing: bool,
}

/// A conversation with one contact. `recipient_public_key` is unique within
/// the chat list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub recipient_public_key: String,
    pub recipient_avatar: Option<String>,
    pub recipient_display_name: Option<String>,
    pub last_seen_app: Option<u64>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Chat {
    pub fn new(recipient_public_key: impl Into<String>) -> Self {
        Self {
            recipient_public_key: recipient_public_key.into(),
            recipient_avatar: None,
            recipient_display_name: None,
            last_seen_app: None,
            messages: Vec::new(),
        }
    }

    /// What this chat tells us about its recipient.
    pub fn recipient(&self) -> PartialUser {
        PartialUser {
            public_key: self.recipient_public_key.clone(),
            display_name: self.recipient_display_name.clone(),
            avatar: self.recipient_avatar.clone(),
            last_seen_app: self.last_seen_app,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Contact requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestDirection {
    Sent,
    #[default]
    Received,
}

/// A pending contact request, sent or received.
///
/// The server names the counterpart's fields differently per direction,
/// hence the aliases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "pk", alias = "requestorPK")]
    pub public_key: String,
    #[serde(default, alias = "requestorDisplayName")]
    pub display_name: Option<String>,
    #[serde(default, alias = "requestorAvatar")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub direction: RequestDirection,
    #[serde(default)]
    pub timestamp: u64,
}

impl Request {
    pub fn with_direction(mut self, direction: RequestDirection) -> Self {
        self.direction = direction;
        self
    }

    /// What this request tells us about the counterpart.
    pub fn counterpart(&self) -> PartialUser {
        PartialUser {
            public_key: self.public_key.clone(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthBundle {
    pub public_key: String,
    pub token: String,
    #[serde(default)]
    pub alias: Option<String>,
}

/// Cached credentials of the signed-in wallet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthData {
    pub auth_data: AuthBundle,
    #[serde(default, rename = "nodeURL")]
    pub node_url: Option<String>,
}

impl AuthData {
    pub fn new(public_key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            auth_data: AuthBundle {
                public_key: public_key.into(),
                token: token.into(),
                alias: None,
            },
            node_url: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.auth_data.token
    }

    pub fn public_key(&self) -> &str {
        &self.auth_data.public_key
    }
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

/// A decoded lightning invoice, without its `payment_request` key.
///
/// Fields the client does not interpret are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DecodedInvoice {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub payment_hash: Option<String>,
    #[serde(default)]
    pub num_satoshis: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The decode endpoint's answer: the invoice plus the request it decodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyedDecodedInvoice {
    pub payment_request: String,
    #[serde(flatten)]
    pub invoice: DecodedInvoice,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_merge_keeps_absent_fields() {
        let mut user = User::empty("pk1");
        user.merge(&PartialUser {
            display_name: Some("alice".into()),
            avatar: Some("img".into()),
            last_seen_app: Some(42),
            ..PartialUser::new("pk1")
        });
        user.merge(&PartialUser {
            bio: Some("hello".into()),
            ..PartialUser::new("pk1")
        });

        assert_eq!(user.display_name.as_deref(), Some("alice"));
        assert_eq!(user.avatar.as_deref(), Some("img"));
        assert_eq!(user.bio.as_deref(), Some("hello"));
        assert_eq!(user.last_seen_app, 42);
        assert_eq!(user.last_seen_node, 0);
    }

    #[test]
    fn test_chat_parses_server_shape() {
        let json = r#"{
            "recipientPublicKey": "abc",
            "recipientAvatar": null,
            "recipientDisplayName": "bob",
            "lastSeenApp": 1600000000000,
            "messages": [{"id": "m1", "body": "hi", "timestamp": 5, "outgoing": true}],
            "didDisconnect": false
        }"#;

        let chat: Chat = serde_json::from_str(json).unwrap();
        assert_eq!(chat.recipient_public_key, "abc");
        assert_eq!(chat.recipient_avatar, None);
        assert_eq!(chat.messages.len(), 1);
        assert!(chat.messages[0].outgoing);

        let recipient = chat.recipient();
        assert_eq!(recipient.display_name.as_deref(), Some("bob"));
        assert_eq!(recipient.last_seen_app, Some(1_600_000_000_000));
    }

    #[test]
    fn test_request_aliases() {
        let sent: Request =
            serde_json::from_str(r#"{"id": "r1", "pk": "k1", "displayName": "carol"}"#).unwrap();
        assert_eq!(sent.public_key, "k1");

        let received: Request = serde_json::from_str(
            r#"{"id": "r2", "requestorPK": "k2", "requestorAvatar": "a", "timestamp": 9}"#,
        )
        .unwrap();
        assert_eq!(received.public_key, "k2");
        assert_eq!(received.avatar.as_deref(), Some("a"));
        assert_eq!(received.direction, RequestDirection::Received);

        let sent = sent.with_direction(RequestDirection::Sent);
        assert_eq!(sent.direction, RequestDirection::Sent);
    }

    #[test]
    fn test_auth_data_wire_names() {
        let json = r#"{"authData": {"publicKey": "pub", "token": "tok", "alias": "me"}, "nodeURL": "http://n"}"#;
        let auth: AuthData = serde_json::from_str(json).unwrap();
        assert_eq!(auth.token(), "tok");
        assert_eq!(auth.public_key(), "pub");
        assert_eq!(auth.node_url.as_deref(), Some("http://n"));
    }

    #[test]
    fn test_keyed_invoice_splits_key() {
        let json = r#"{"payment_request": "lnbc1", "num_satoshis": "10", "route_hints": []}"#;
        let keyed: KeyedDecodedInvoice = serde_json::from_str(json).unwrap();
        assert_eq!(keyed.payment_request, "lnbc1");
        assert_eq!(keyed.invoice.num_satoshis.as_deref(), Some("10"));
        assert!(keyed.invoice.extra.contains_key("route_hints"));
        assert!(!keyed.invoice.extra.contains_key("payment_request"));
    }
}
