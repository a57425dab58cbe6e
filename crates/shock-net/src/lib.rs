// Real-time socket layer: one long-lived websocket session with automatic
// reconnection, a raw event handler registry, and heartbeat liveness.

pub mod connection;
pub mod error;
pub mod liveness;
pub mod registry;
pub mod transport;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState, WeakConnectionManager};
pub use error::NetError;
pub use liveness::Liveness;
pub use registry::{handler, EventHandler, HandlerRegistry};
pub use transport::open_socket;
