use std::time::Duration;

use thiserror::Error;

use shock_net::NetError;
use shock_store::StoreError;

/// Failure of a call to the node.
#[derive(Error, Debug)]
pub enum RemoteOperationError {
    /// The node answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The request never got an answer (connection refused, TLS, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node answered successfully but not with what we expected.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteOperationError {
    /// HTTP status of a rejected call.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not authenticated: no auth data cached")]
    AuthRequired,

    #[error(transparent)]
    Remote(#[from] RemoteOperationError),

    #[error("Invalid fees provided: {0}")]
    InvalidFee(String),

    #[error("NOT_CONNECTED")]
    NotConnected,

    #[error("Cache error: {0}")]
    Store(StoreError),

    #[error("Connection error: {0}")]
    Connection(#[from] NetError),
}

impl From<StoreError> for ClientError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AuthRequired => Self::AuthRequired,
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
