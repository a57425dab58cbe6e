//! Bridge from raw socket events to the state mirror.
//!
//! One handler per snapshot event decodes the envelope and applies it.
//! Every time the socket comes up the bridge asks the node for all
//! snapshots again, so a reconnect converges without replaying missed
//! frames.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, trace, warn};

use shock_net::{handler, ConnectionManager, EventHandler, WeakConnectionManager};
use shock_shared::protocol::{InboundEvent, EVENT_CONNECT, SNAPSHOT_EVENTS};
use shock_store::{Cache, StoreError};

use crate::events::StateMirror;

pub struct SyncBridge {
    connection: ConnectionManager,
    mirror: Arc<StateMirror>,
    cache: Arc<Cache>,
    installed: Mutex<Vec<(&'static str, EventHandler)>>,
}

impl SyncBridge {
    pub fn new(connection: ConnectionManager, mirror: Arc<StateMirror>, cache: Arc<Cache>) -> Self {
        Self {
            connection,
            mirror,
            cache,
            installed: Mutex::new(Vec::new()),
        }
    }

    pub fn is_installed(&self) -> bool {
        !self.installed.lock().is_empty()
    }

    /// Register the bridge's handlers. Installing twice is a no-op.
    pub fn install(&self) {
        let mut installed = self.installed.lock();
        if !installed.is_empty() {
            return;
        }

        for event in SNAPSHOT_EVENTS {
            let h = snapshot_handler(event, Arc::clone(&self.mirror));
            self.connection.on(event, Arc::clone(&h));
            installed.push((event, h));
        }

        let h = resubscribe_handler(self.connection.downgrade(), Arc::clone(&self.cache));
        self.connection.on(EVENT_CONNECT, Arc::clone(&h));
        installed.push((EVENT_CONNECT, h));

        debug!(handlers = installed.len(), "sync bridge installed");
    }

    pub fn uninstall(&self) {
        let mut installed = self.installed.lock();
        for (event, h) in installed.drain(..) {
            self.connection.off(event, &h);
        }
        debug!("sync bridge uninstalled");
    }

    /// Ask the node for every snapshot. Skipped when signed out or offline.
    pub fn request_snapshots(&self) {
        request_snapshots(&self.connection, &self.cache);
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        self.uninstall();
    }
}

fn snapshot_handler(event: &'static str, mirror: Arc<StateMirror>) -> EventHandler {
    handler(move |data: &Value| match InboundEvent::decode(event, data) {
        Ok(Some(inbound)) => mirror.apply(inbound),
        Ok(None) => trace!(event, "not a snapshot event"),
        Err(e) => warn!(event, error = %e, "dropping snapshot"),
    })
}

// Weak: the handler lives inside the manager's own registry.
fn resubscribe_handler(connection: WeakConnectionManager, cache: Arc<Cache>) -> EventHandler {
    handler(move |_: &Value| {
        if let Some(connection) = connection.upgrade() {
            request_snapshots(&connection, &cache);
        }
    })
}

fn request_snapshots(connection: &ConnectionManager, cache: &Cache) {
    let token = match cache.get_token() {
        Ok(token) => token,
        Err(StoreError::AuthRequired) => {
            debug!("not signed in, skipping snapshot requests");
            return;
        }
        Err(e) => {
            warn!(error = %e, "could not read token for snapshot requests");
            return;
        }
    };

    if !connection.is_connected() {
        debug!("socket down, skipping snapshot requests");
        return;
    }

    for event in SNAPSHOT_EVENTS {
        connection.emit(event, json!({ "token": &token }));
    }
    debug!("requested snapshots");
}

#[cfg(test)]
mod tests {
    use super::*;

    use shock_net::ConnectionConfig;
    use shock_shared::protocol::{ON_BIO, ON_CHATS, ON_RECEIVED_REQUESTS};
    use shock_shared::types::{AuthData, RequestDirection};

    use crate::test_support::{eventually, next_frame, push, MockSocketServer};

    struct Fixture {
        server: MockSocketServer,
        connection: ConnectionManager,
        mirror: Arc<StateMirror>,
        bridge: SyncBridge,
    }

    async fn fixture() -> Fixture {
        let server = MockSocketServer::start().await;
        let cache = Arc::new(Cache::open_in_memory().unwrap());
        cache
            .write_stored_auth_data(Some(&AuthData::new("my-pub", "my-token")))
            .unwrap();
        let connection = ConnectionManager::new(ConnectionConfig::new(&server.url), Arc::clone(&cache));
        let mirror = Arc::new(StateMirror::new());
        let bridge = SyncBridge::new(connection.clone(), Arc::clone(&mirror), cache);
        Fixture {
            server,
            connection,
            mirror,
            bridge,
        }
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let f = fixture().await;
        f.bridge.install();
        f.bridge.install();
        assert_eq!(f.connection.handler_count(ON_CHATS), 1);
        assert_eq!(f.connection.handler_count(EVENT_CONNECT), 1);

        f.bridge.uninstall();
        assert!(!f.bridge.is_installed());
        assert_eq!(f.connection.handler_count(ON_CHATS), 0);
        assert_eq!(f.connection.handler_count(EVENT_CONNECT), 0);
    }

    #[tokio::test]
    async fn test_requests_snapshots_on_connect() {
        let mut f = fixture().await;
        f.bridge.install();
        f.connection.connect().await.unwrap();
        let mut socket = f.server.accept().await;

        let mut events = Vec::new();
        for _ in 0..SNAPSHOT_EVENTS.len() {
            let frame = next_frame(&mut socket).await;
            assert_eq!(frame.data, json!({"token": "my-token"}));
            events.push(frame.event);
        }
        assert_eq!(events, SNAPSHOT_EVENTS.to_vec());

        f.connection.disconnect();
    }

    #[tokio::test]
    async fn test_pushed_chats_reach_mirror_and_users() {
        let mut f = fixture().await;
        f.bridge.install();
        f.connection.connect().await.unwrap();
        let mut socket = f.server.accept().await;

        push(
            &mut socket,
            ON_CHATS,
            json!({
                "ok": true,
                "msg": [{
                    "recipientPublicKey": "alice-pub",
                    "recipientDisplayName": "Alice",
                    "recipientAvatar": null,
                    "lastSeenApp": 1700000000000u64,
                    "messages": [],
                }],
                "origBody": {},
            }),
        )
        .await;

        let mirror = Arc::clone(&f.mirror);
        eventually(|| mirror.chats().get().len() == 1).await;
        assert_eq!(f.mirror.chats().get()[0].recipient_public_key, "alice-pub");
        let alice = f.mirror.users().get("alice-pub");
        assert_eq!(alice.display_name.as_deref(), Some("Alice"));
        assert_eq!(alice.last_seen_app, 1700000000000);

        f.connection.disconnect();
    }

    #[tokio::test]
    async fn test_received_requests_and_bio() {
        let mut f = fixture().await;
        f.bridge.install();
        f.connection.connect().await.unwrap();
        let mut socket = f.server.accept().await;

        push(
            &mut socket,
            ON_RECEIVED_REQUESTS,
            json!({
                "ok": true,
                "msg": [{"id": "r1", "requestorPK": "bob-pub", "requestorDisplayName": "Bob", "timestamp": 1}],
                "origBody": {},
            }),
        )
        .await;
        push(&mut socket, ON_BIO, json!({"ok": true, "msg": "hodl", "origBody": {}})).await;

        let mirror = Arc::clone(&f.mirror);
        eventually(|| mirror.bio().get().is_some()).await;
        let requests = f.mirror.received_requests().get();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].direction, RequestDirection::Received);
        assert!(f.mirror.users().contains("bob-pub"));
        assert_eq!(f.mirror.bio().get().as_deref(), Some("hodl"));

        f.connection.disconnect();
    }

    #[tokio::test]
    async fn test_rejected_snapshot_keeps_mirror() {
        let mut f = fixture().await;
        f.bridge.install();
        f.connection.connect().await.unwrap();
        let mut socket = f.server.accept().await;

        push(&mut socket, ON_BIO, json!({"ok": false, "msg": "token expired", "origBody": {}})).await;
        push(&mut socket, ON_BIO, json!({"ok": true, "msg": "after", "origBody": {}})).await;

        let mirror = Arc::clone(&f.mirror);
        eventually(|| mirror.bio().get().is_some()).await;
        assert_eq!(f.mirror.bio().get().as_deref(), Some("after"));

        f.connection.disconnect();
    }

    #[tokio::test]
    async fn test_dropping_bridge_unregisters() {
        let f = fixture().await;
        f.bridge.install();
        let connection = f.connection.clone();
        drop(f);
        assert_eq!(connection.handler_count(ON_CHATS), 0);
    }
}
