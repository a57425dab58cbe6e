//! Client configuration loaded from environment variables.
//!
//! Every setting has a default so the client starts against a local node
//! with zero configuration.

use std::path::PathBuf;
use std::time::Duration;

use shock_net::ConnectionConfig;
use shock_shared::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_NODE_URL, SOCKET_PATH,
};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the wallet node's HTTP API.
    /// Env: `SHOCK_NODE_URL`
    /// Default: `http://127.0.0.1:9835`
    pub node_url: String,

    /// Websocket endpoint.
    /// Env: `SHOCK_SOCKET_URL`
    /// Default: derived from `node_url` (`ws(s)://<host>/ws`).
    pub socket_url: String,

    /// Per-call HTTP timeout. Payments use their own, longer timeout.
    /// Env: `SHOCK_HTTP_TIMEOUT_SECS`
    pub http_timeout: Duration,

    /// How long `connect()` waits for the socket.
    /// Env: `SHOCK_CONNECT_TIMEOUT_SECS`
    pub connect_timeout: Duration,

    /// Directory holding the cache database.
    /// Env: `SHOCK_DATA_DIR`
    /// Default: `None`, the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_string(),
            socket_url: socket_url_for(DEFAULT_NODE_URL),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            data_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("SHOCK_NODE_URL") {
            if url.starts_with("http://") || url.starts_with("https://") {
                config = config.with_node_url(url);
            } else {
                tracing::warn!(value = %url, "Invalid SHOCK_NODE_URL, using default");
            }
        }

        if let Ok(url) = std::env::var("SHOCK_SOCKET_URL") {
            if url.starts_with("ws://") || url.starts_with("wss://") {
                config.socket_url = url;
            } else {
                tracing::warn!(value = %url, "Invalid SHOCK_SOCKET_URL, deriving from node URL");
            }
        }

        if let Some(timeout) = env_secs("SHOCK_HTTP_TIMEOUT_SECS") {
            config.http_timeout = timeout;
        }

        if let Some(timeout) = env_secs("SHOCK_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = timeout;
        }

        if let Ok(dir) = std::env::var("SHOCK_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = Some(PathBuf::from(dir));
            }
        }

        config
    }

    /// Point the client at another node. The socket URL follows.
    pub fn with_node_url(mut self, node_url: impl Into<String>) -> Self {
        let node_url = node_url.into();
        self.socket_url = socket_url_for(&node_url);
        self.node_url = node_url;
        self
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout: self.connect_timeout,
            ..ConnectionConfig::new(self.socket_url.clone())
        }
    }
}

/// The websocket endpoint served by the node at `node_url`.
pub fn socket_url_for(node_url: &str) -> String {
    let trimmed = node_url.trim_end_matches('/');
    let base = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{trimmed}")
    };
    format!("{base}{SOCKET_PATH}")
}

fn env_secs(name: &str) -> Option<Duration> {
    let value = std::env::var(name).ok()?;
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
        _ => {
            tracing::warn!(var = name, value = %value, "Invalid timeout, using default");
            None
        }
    }
}
