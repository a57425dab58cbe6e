//! Types and wire definitions shared by every Shock client crate.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use protocol::{InboundEvent, SocketResponse, WireFrame};
pub use types::*;
