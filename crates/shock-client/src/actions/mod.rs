//! Mutating operations against the node.
//!
//! Most actions are fire-and-check: call the node, surface its error
//! message on failure, leave the mirror to be updated by the next push.
//! `disconnect` mutates the mirror first and compensates on failure.
//! Each sub-module extends [`Actions`] for one domain.

pub mod chats;
pub mod follows;
pub mod handshake;
pub mod payments;
pub mod posts;
pub mod profile;
pub mod requests;

use std::sync::Arc;

use tracing::warn;

use shock_net::ConnectionManager;
use shock_store::Cache;

use crate::error::Result;
use crate::events::StateMirror;
use crate::http::ApiClient;

pub use chats::ChatRemoval;
pub use payments::{fee_limit, FeePolicy};

#[derive(Clone)]
pub struct Actions {
    api: Arc<ApiClient>,
    connection: ConnectionManager,
    mirror: Arc<StateMirror>,
    cache: Arc<Cache>,
}

impl Actions {
    pub fn new(
        api: Arc<ApiClient>,
        connection: ConnectionManager,
        mirror: Arc<StateMirror>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            api,
            connection,
            mirror,
            cache,
        }
    }
}

/// Log a failed action before handing the error back.
fn logged<T>(action: &'static str, result: Result<T>) -> Result<T> {
    if let Err(ref e) = result {
        warn!(action, error = %e, "action failed");
    }
    result
}
