/// Application name
pub const APP_NAME: &str = "Shock Wallet";

/// Default node the client talks to when nothing is configured
pub const DEFAULT_NODE_URL: &str = "http://127.0.0.1:9835";

/// Path of the websocket endpoint, relative to the node URL
pub const SOCKET_PATH: &str = "/ws";

/// Default timeout for ordinary API calls, in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Payments settle slower than ordinary calls
pub const PAYMENT_TIMEOUT_SECS: u64 = 30;

/// Default time allowed for `connect()` to observe a live socket, in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Reconnect backoff bounds, in milliseconds
pub const RECONNECT_BASE_DELAY_MS: u64 = 500;
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// A heartbeat older than this means the server stopped talking to us
pub const LIVENESS_WINDOW_SECS: u64 = 5;

/// Message used when the server rejects a call without explaining why
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown Error";

/// Follow/unfollow failures with no server message
pub const NO_SERVER_MESSAGE: &str = "Unknown Error (Did not receive msg from server)";
