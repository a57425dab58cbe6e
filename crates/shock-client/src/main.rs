//! # shock-sync
//!
//! Headless sync client: connects to the configured node, keeps the state
//! mirror current and logs what arrives until interrupted.

use tracing::{info, warn};

use shock_client::{AppState, ClientConfig, ClientError};
use shock_shared::constants::APP_NAME;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shock_client::init_logging();
    info!("Starting {APP_NAME} sync client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let state = AppState::new(config)?;
    info!(device_id = %state.device_id()?, "Cache opened");

    if state.cache().get_stored_auth_data()?.is_none() {
        warn!("No cached credentials, the node will not push any snapshots");
    }

    let chats = state
        .mirror()
        .chats()
        .subscribe(|chats| info!(count = chats.len(), "chats"));
    let received = state
        .mirror()
        .received_requests()
        .subscribe(|requests| info!(count = requests.len(), "received requests"));
    let address = state
        .mirror()
        .handshake_address()
        .subscribe(|address| info!(?address, "handshake address"));

    match state.start().await {
        Ok(()) => {}
        Err(ClientError::Connection(e)) => warn!(error = %e, "Node not reachable yet, retrying"),
        Err(e) => return Err(e.into()),
    }

    tokio::signal::ctrl_c().await?;
    info!(alive = state.is_server_alive(), "Shutting down");

    chats.unsubscribe();
    received.unsubscribe();
    address.unsubscribe();
    Ok(())
}
