use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    /// `connect()` gave up waiting. The session keeps retrying in the
    /// background.
    #[error("Socket did not connect within {0:?}")]
    ConnectTimeout(Duration),

    /// The session was torn down while a caller was waiting on it.
    #[error("Connection closed")]
    Closed,
}
