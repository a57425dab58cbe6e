use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Server rejected {event}: {message}")]
    Rejected { event: String, message: String },

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}
