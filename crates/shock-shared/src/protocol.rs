//! Socket wire protocol.
//!
//! Every message on the socket is a single JSON text frame of the form
//! `{"event": <name>, "data": <payload>}`. Entity snapshots pushed by the
//! server are wrapped in a [`SocketResponse`] envelope.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{Chat, Request, RequestDirection};

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub const ON_CHATS: &str = "ON_CHATS";
pub const ON_SENT_REQUESTS: &str = "ON_SENT_REQUESTS";
pub const ON_RECEIVED_REQUESTS: &str = "ON_RECEIVED_REQUESTS";
pub const ON_HANDSHAKE_ADDRESS: &str = "ON_HANDSHAKE_ADDRESS";
pub const ON_BIO: &str = "ON_BIO";

/// Server heartbeat.
pub const SET_LAST_SEEN_APP: &str = "SET_LAST_SEEN_APP";

/// Ask the server to rotate the handshake address.
pub const GENERATE_NEW_HANDSHAKE_NODE: &str = "GENERATE_NEW_HANDSHAKE_NODE";

/// Dispatched locally when the transport comes up. Never sent on the wire.
pub const EVENT_CONNECT: &str = "connect";

/// Dispatched locally when the transport goes down. Never sent on the wire.
pub const EVENT_DISCONNECT: &str = "disconnect";

/// Entity events the client subscribes to after every (re)connect.
pub const SNAPSHOT_EVENTS: [&str; 5] = [
    ON_CHATS,
    ON_SENT_REQUESTS,
    ON_RECEIVED_REQUESTS,
    ON_HANDSHAKE_ADDRESS,
    ON_BIO,
];

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// One socket message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WireFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn to_text(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self, ProtocolError> {
        let frame: Self = serde_json::from_str(text)?;
        if frame.event.is_empty() {
            return Err(ProtocolError::MalformedFrame("empty event name".into()));
        }
        Ok(frame)
    }
}

/// Envelope wrapping every entity snapshot.
///
/// `msg` carries the payload when `ok` is true and an error string otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SocketResponse {
    pub ok: bool,
    #[serde(default)]
    pub msg: Value,
    #[serde(default)]
    pub orig_body: Value,
}

impl SocketResponse {
    /// Unwrap the payload, turning a rejected envelope into an error.
    pub fn into_payload<T: DeserializeOwned>(self, event: &str) -> Result<T, ProtocolError> {
        if !self.ok {
            let message = match self.msg {
                Value::String(s) => s,
                Value::Null => crate::constants::UNKNOWN_ERROR_MESSAGE.to_string(),
                other => other.to_string(),
            };
            return Err(ProtocolError::Rejected {
                event: event.to_string(),
                message,
            });
        }
        Ok(serde_json::from_value(self.msg)?)
    }
}

// ---------------------------------------------------------------------------
// Typed inbound events
// ---------------------------------------------------------------------------

/// A server push, decoded into the entity it carries.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Chats(Vec<Chat>),
    SentRequests(Vec<Request>),
    ReceivedRequests(Vec<Request>),
    HandshakeAddress(String),
    Bio(Option<String>),
    /// Heartbeat, with the server's timestamp when it sent one.
    LastSeenApp(Option<u64>),
}

impl InboundEvent {
    /// Decode the payload of `event`.
    ///
    /// Returns `Ok(None)` for events that carry no tracked entity.
    pub fn decode(event: &str, data: &Value) -> Result<Option<Self>, ProtocolError> {
        let decoded = match event {
            ON_CHATS => Self::Chats(envelope(event, data)?),
            ON_SENT_REQUESTS => {
                let requests: Vec<Request> = envelope(event, data)?;
                Self::SentRequests(
                    requests
                        .into_iter()
                        .map(|r| r.with_direction(RequestDirection::Sent))
                        .collect(),
                )
            }
            ON_RECEIVED_REQUESTS => {
                let requests: Vec<Request> = envelope(event, data)?;
                Self::ReceivedRequests(
                    requests
                        .into_iter()
                        .map(|r| r.with_direction(RequestDirection::Received))
                        .collect(),
                )
            }
            ON_HANDSHAKE_ADDRESS => Self::HandshakeAddress(envelope(event, data)?),
            ON_BIO => Self::Bio(envelope(event, data)?),
            SET_LAST_SEEN_APP => Self::LastSeenApp(data.as_u64()),
            _ => return Ok(None),
        };
        Ok(Some(decoded))
    }
}

fn envelope<T: DeserializeOwned>(event: &str, data: &Value) -> Result<T, ProtocolError> {
    let response: SocketResponse = serde_json::from_value(data.clone())?;
    response.into_payload(event)
}
