//! Socket session orchestration.
//!
//! A single background task owns the websocket. It connects, pumps frames in
//! both directions, and on transport loss backs off and reconnects until
//! [`ConnectionManager::disconnect`] is called. Callers reach the task
//! through an outbound frame channel and observe it through a `watch` of the
//! [`ConnectionState`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use shock_shared::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, RECONNECT_BASE_DELAY_MS, RECONNECT_MAX_DELAY_MS,
};
use shock_shared::protocol::{WireFrame, EVENT_CONNECT, EVENT_DISCONNECT, SET_LAST_SEEN_APP};
use shock_store::{Cache, StoreError};

use crate::error::NetError;
use crate::liveness::Liveness;
use crate::registry::{EventHandler, HandlerRegistry};
use crate::transport::{open_socket, SocketStream};

/// How long a closing session waits to flush its close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Configuration / state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Websocket endpoint, `ws://` or `wss://`.
    pub url: String,
    /// How long `connect()` waits for the session to come up.
    pub connect_timeout: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Capacity of the outbound frame queue.
    pub outbound_buffer: usize,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            reconnect_base_delay: Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            reconnect_max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
            outbound_buffer: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Why a connected session stopped pumping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpExit {
    /// `disconnect()` was called.
    Shutdown,
    /// The server closed the socket.
    Closed,
    /// Read or write failed.
    Failed,
}

impl PumpExit {
    fn reason(self) -> &'static str {
        match self {
            Self::Shutdown => "client disconnect",
            Self::Closed => "transport close",
            Self::Failed => "transport error",
        }
    }
}

struct Session {
    id: u64,
    outbound: mpsc::Sender<WireFrame>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

struct Inner {
    config: ConnectionConfig,
    cache: Arc<Cache>,
    registry: HandlerRegistry,
    liveness: Liveness,
    state: watch::Sender<ConnectionState>,
    session: Mutex<Option<Session>>,
    next_session_id: AtomicU64,
    /// Bumped by every `disconnect()`, so pending `connect()` calls can tell
    /// their session is gone.
    teardowns: AtomicU64,
}

impl Inner {
    /// Publish `state` on behalf of session `id`. Returns `false` when that
    /// session has been replaced or torn down, in which case nothing changes.
    fn publish(&self, id: u64, state: ConnectionState) -> bool {
        let session = self.session.lock();
        if session.as_ref().map(|s| s.id) != Some(id) {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    fn token(&self) -> Option<String> {
        match self.cache.get_token() {
            Ok(token) => Some(token),
            Err(StoreError::AuthRequired) => None,
            Err(e) => {
                warn!(error = %e, "could not read cached token, connecting without it");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owner of the long-lived socket. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, cache: Arc<Cache>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                cache,
                registry: HandlerRegistry::new(),
                liveness: Liveness::new(),
                state,
                session: Mutex::new(None),
                next_session_id: AtomicU64::new(1),
                teardowns: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Observe state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn liveness(&self) -> &Liveness {
        &self.inner.liveness
    }

    /// Whether the server heartbeat arrived within `window`.
    pub fn is_alive(&self, window: Duration) -> bool {
        self.is_connected() && self.inner.liveness.is_alive(window)
    }

    /// Bring the socket up and wait for it. Returns immediately when already
    /// connected.
    ///
    /// # Errors
    /// [`NetError::ConnectTimeout`] when the socket is not up within the
    /// configured timeout. The session keeps retrying in the background.
    ///
    /// [`NetError::Closed`] when `disconnect()` tears the session down
    /// before it comes up.
    pub async fn connect(&self) -> Result<(), NetError> {
        if self.is_connected() {
            return Ok(());
        }

        // Read before spawning so a teardown racing the spawn is not missed.
        let teardowns = self.inner.teardowns.load(Ordering::Acquire);
        self.ensure_session();

        let inner = Arc::clone(&self.inner);
        let mut changes = self.inner.state.subscribe();
        let wait = async move {
            let state = changes
                .wait_for(|s| {
                    *s == ConnectionState::Connected
                        || inner.teardowns.load(Ordering::Acquire) != teardowns
                })
                .await
                .map(|s| *s)
                .map_err(|_| NetError::Closed)?;
            if state == ConnectionState::Connected {
                Ok(())
            } else {
                Err(NetError::Closed)
            }
        };

        let limit = self.inner.config.connect_timeout;
        match tokio::time::timeout(limit, wait).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %self.inner.config.url, timeout = ?limit, "socket connect timed out");
                Err(NetError::ConnectTimeout(limit))
            }
        }
    }

    /// Tear the transport down. Registered handlers stay in place.
    pub fn disconnect(&self) {
        let session = self.inner.session.lock().take();
        self.inner.teardowns.fetch_add(1, Ordering::AcqRel);
        self.inner.state.send_replace(ConnectionState::Disconnected);
        self.inner.liveness.reset();

        if let Some(mut session) = session {
            if let Some(shutdown) = session.shutdown.take() {
                let _ = shutdown.send(());
            }
            info!(session = session.id, "socket disconnect requested");
        }
    }

    /// Send a frame. Dropped with a warning when the socket is not connected.
    pub fn emit(&self, event: &str, data: Value) {
        let session = self.inner.session.lock();
        let Some(session) = session.as_ref().filter(|_| self.is_connected()) else {
            warn!(event, "socket not connected, dropping outbound event");
            return;
        };

        if let Err(e) = session.outbound.try_send(WireFrame::new(event, data)) {
            warn!(event, error = %e, "outbound queue rejected event");
        }
    }

    pub fn on(&self, event: &str, handler: EventHandler) -> bool {
        self.inner.registry.on(event, handler)
    }

    pub fn off(&self, event: &str, handler: &EventHandler) -> bool {
        self.inner.registry.off(event, handler)
    }

    /// Run the handlers of `event` as if the server had pushed it.
    pub fn dispatch(&self, event: &str, data: &Value) -> usize {
        self.inner.registry.dispatch(event, data)
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.inner.registry.handler_count(event)
    }

    /// A handle that does not keep the manager alive, for handlers the
    /// manager itself stores.
    pub fn downgrade(&self) -> WeakConnectionManager {
        WeakConnectionManager {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn ensure_session(&self) {
        let mut session = self.inner.session.lock();
        if session.as_ref().is_some_and(|s| !s.task.is_finished()) {
            return;
        }

        let id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.inner.config.outbound_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_session(
            Arc::clone(&self.inner),
            id,
            outbound_rx,
            shutdown_rx,
        ));

        *session = Some(Session {
            id,
            outbound: outbound_tx,
            shutdown: Some(shutdown_tx),
            task,
        });

        debug!(session = id, url = %self.inner.config.url, "spawned socket session");
    }
}

#[derive(Clone)]
pub struct WeakConnectionManager {
    inner: Weak<Inner>,
}

impl WeakConnectionManager {
    pub fn upgrade(&self) -> Option<ConnectionManager> {
        self.inner.upgrade().map(|inner| ConnectionManager { inner })
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

async fn run_session(
    inner: Arc<Inner>,
    id: u64,
    mut outbound: mpsc::Receiver<WireFrame>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut attempt: u32 = 0;

    loop {
        if !inner.publish(id, ConnectionState::Connecting) {
            break;
        }

        let token = inner.token();
        let opened = tokio::select! {
            _ = &mut shutdown => break,
            result = open_socket(&inner.config.url, token.as_deref()) => result,
        };

        match opened {
            Ok(stream) => {
                attempt = 0;
                if !inner.publish(id, ConnectionState::Connected) {
                    break;
                }
                info!(session = id, url = %inner.config.url, "socket connected");
                inner.registry.dispatch(EVENT_CONNECT, &Value::Null);

                let exit = pump(&inner, stream, &mut outbound, &mut shutdown).await;

                inner.publish(id, ConnectionState::Disconnected);
                info!(session = id, reason = exit.reason(), "socket disconnected");
                inner
                    .registry
                    .dispatch(EVENT_DISCONNECT, &Value::from(exit.reason()));

                if exit == PumpExit::Shutdown {
                    break;
                }
            }
            Err(e) => {
                warn!(session = id, attempt, error = %format!("{e:#}"), "socket connect failed");
                if !inner.publish(id, ConnectionState::Disconnected) {
                    break;
                }
            }
        }

        let delay = backoff_delay(&inner.config, attempt);
        attempt = attempt.saturating_add(1);
        debug!(session = id, attempt, delay_ms = delay.as_millis() as u64, "reconnecting");

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(session = id, "socket session terminated");
}

async fn pump(
    inner: &Inner,
    stream: SocketStream,
    outbound: &mut mpsc::Receiver<WireFrame>,
    shutdown: &mut oneshot::Receiver<()>,
) -> PumpExit {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                let _ = tokio::time::timeout(CLOSE_GRACE, write.send(Message::Close(None))).await;
                return PumpExit::Shutdown;
            }

            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    return PumpExit::Shutdown;
                };
                let text = match frame.to_text() {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(event = %frame.event, error = %e, "could not encode outbound event");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!(event = %frame.event, error = %e, "socket write failed");
                    return PumpExit::Failed;
                }
                trace!(event = %frame.event, "sent frame");
            }

            message = read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => handle_text(inner, &text),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "server closed socket");
                        return PumpExit::Closed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "socket read failed");
                        return PumpExit::Failed;
                    }
                    None => return PumpExit::Closed,
                }
            }
        }
    }
}

fn handle_text(inner: &Inner, text: &str) {
    let frame = match WireFrame::from_text(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, len = text.len(), "dropping malformed frame");
            return;
        }
    };

    if frame.event == SET_LAST_SEEN_APP {
        inner.liveness.record(frame.data.as_u64());
    }

    let handled = inner.registry.dispatch(&frame.event, &frame.data);
    trace!(event = %frame.event, handled, "received frame");
}

/// Exponential backoff from the base delay, capped, with up to 25% jitter.
fn backoff_delay(config: &ConnectionConfig, attempt: u32) -> Duration {
    let base = config.reconnect_base_delay.as_millis() as u64;
    let max = config.reconnect_max_delay.as_millis() as u64;

    let exp = base.saturating_mul(1u64 << attempt.min(20)).min(max);
    let jitter = if exp >= 4 {
        rand::thread_rng().gen_range(0..=exp / 4)
    } else {
        0
    };
    Duration::from_millis(exp.saturating_add(jitter).min(max))
}
