//! Composition root: one instance of every service, wired together.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use shock_net::{ConnectionManager, ConnectionState};
use shock_shared::constants::{DEFAULT_NODE_URL, LIVENESS_WINDOW_SECS};
use shock_shared::types::AuthData;
use shock_store::Cache;

use crate::actions::Actions;
use crate::config::{socket_url_for, ClientConfig};
use crate::error::Result;
use crate::events::StateMirror;
use crate::http::ApiClient;
use crate::invoices::DecodedInvoices;
use crate::sync::SyncBridge;
use crate::users::UserDirectory;

pub struct AppState {
    config: ClientConfig,
    cache: Arc<Cache>,
    connection: ConnectionManager,
    mirror: Arc<StateMirror>,
    invoices: DecodedInvoices,
    actions: Actions,
    bridge: SyncBridge,
}

impl AppState {
    /// Open the cache named by `config` (or the platform default) and build
    /// every service on top of it. Nothing touches the network yet.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let cache = match config.data_dir {
            Some(ref dir) => Cache::open_in_dir(dir)?,
            None => Cache::open_default()?,
        };
        Self::with_cache(config, Arc::new(cache))
    }

    pub fn with_cache(config: ClientConfig, cache: Arc<Cache>) -> Result<Self> {
        let config = apply_cached_node_url(config, &cache)?;

        let connection = ConnectionManager::new(config.connection_config(), Arc::clone(&cache));
        let mirror = Arc::new(StateMirror::new());
        let api = Arc::new(ApiClient::new(
            config.node_url.clone(),
            Arc::clone(&cache),
            config.http_timeout,
        )?);
        let actions = Actions::new(
            api,
            connection.clone(),
            Arc::clone(&mirror),
            Arc::clone(&cache),
        );
        let bridge = SyncBridge::new(connection.clone(), Arc::clone(&mirror), Arc::clone(&cache));

        debug!(node_url = %config.node_url, socket_url = %config.socket_url, "app state built");

        Ok(Self {
            config,
            cache,
            connection,
            mirror,
            invoices: DecodedInvoices::new(),
            actions,
            bridge,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn mirror(&self) -> &Arc<StateMirror> {
        &self.mirror
    }

    pub fn users(&self) -> &UserDirectory {
        self.mirror.users()
    }

    pub fn invoices(&self) -> &DecodedInvoices {
        &self.invoices
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    pub fn device_id(&self) -> Result<String> {
        Ok(self.cache.device_id_or_create()?)
    }

    /// Whether the server sent a heartbeat within the last few seconds.
    pub fn is_server_alive(&self) -> bool {
        self.connection
            .is_alive(Duration::from_secs(LIVENESS_WINDOW_SECS))
    }

    /// Wire the mirror to the socket and connect. On a connect timeout the
    /// error is returned but the session keeps retrying in the background.
    pub async fn start(&self) -> Result<()> {
        self.bridge.install();
        self.connection.connect().await?;
        info!(url = %self.config.socket_url, "client started");
        Ok(())
    }

    /// Store fresh credentials and reconnect so the socket authenticates
    /// with them.
    pub async fn sign_in(&self, auth: AuthData) -> Result<()> {
        self.cache.write_stored_auth_data(Some(&auth))?;
        if let Some(ref url) = auth.node_url {
            self.cache.write_node_url(Some(url))?;
        }
        info!(public_key = auth.public_key(), "signed in");

        if self.connection.state() != ConnectionState::Disconnected {
            self.connection.disconnect();
        }
        self.start().await
    }

    /// Drop credentials and everything mirrored for them. The device id and
    /// node URL stay.
    pub fn sign_out(&self) -> Result<()> {
        self.connection.disconnect();
        self.cache.write_stored_auth_data(None)?;
        self.forget_session_state();
        info!("signed out");
        Ok(())
    }

    /// Back to a fresh install: every cached key goes.
    pub fn clear_all_storage(&self) -> Result<()> {
        self.connection.disconnect();
        self.cache.clear_all_storage()?;
        self.forget_session_state();
        warn!("all local storage cleared");
        Ok(())
    }

    fn forget_session_state(&self) {
        self.mirror.reset();
        self.invoices.clear();
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        // The session task holds the manager's internals alive.
        self.connection.disconnect();
    }
}

/// A node URL remembered from an earlier sign-in wins over the built-in
/// default, never over an explicit setting.
fn apply_cached_node_url(config: ClientConfig, cache: &Cache) -> Result<ClientConfig> {
    if config.node_url != DEFAULT_NODE_URL {
        return Ok(config);
    }
    let Some(cached) = cache.get_node_url()? else {
        return Ok(config);
    };

    let explicit_socket = config.socket_url != socket_url_for(DEFAULT_NODE_URL);
    let socket_url = config.socket_url.clone();
    let mut config = config.with_node_url(cached);
    if explicit_socket {
        config.socket_url = socket_url;
    }
    debug!(node_url = %config.node_url, "using cached node url");
    Ok(config)
}
