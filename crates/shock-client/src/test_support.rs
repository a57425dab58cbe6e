//! Local doubles of the node for tests: an axum HTTP server that records
//! every call and answers with a configurable reply, and a websocket
//! acceptor.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use shock_shared::protocol::WireFrame;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

struct MockState {
    calls: Mutex<Vec<RecordedCall>>,
    reply: Mutex<(u16, Value)>,
    delay: Mutex<Duration>,
}

pub(crate) struct MockApi {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockApi {
    pub async fn start(status: u16, body: Value) -> Self {
        let state = Arc::new(MockState {
            calls: Mutex::new(Vec::new()),
            reply: Mutex::new((status, body)),
            delay: Mutex::new(Duration::ZERO),
        });

        let app = Router::new()
            .fallback(record)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn respond_with(&self, status: u16, body: Value) {
        *self.state.reply.lock() = (status, body);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    pub fn last_call(&self) -> RecordedCall {
        self.calls().pop().expect("no call recorded")
    }
}

async fn record(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };

    state.calls.lock().push(RecordedCall {
        method: method.to_string(),
        path: uri.path().to_string(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body,
    });

    let delay = *state.delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let (status, reply) = state.reply.lock().clone();
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(reply),
    )
}

pub(crate) type ServerSocket = WebSocketStream<TcpStream>;

/// Websocket acceptor handing every accepted socket to the test.
pub(crate) struct MockSocketServer {
    pub url: String,
    accepted: mpsc::UnboundedReceiver<ServerSocket>,
}

impl MockSocketServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, accepted) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(socket) = tokio_tungstenite::accept_async(stream).await {
                    if tx.send(socket).is_err() {
                        break;
                    }
                }
            }
        });

        Self {
            url: format!("ws://{addr}/ws"),
            accepted,
        }
    }

    pub async fn accept(&mut self) -> ServerSocket {
        tokio::time::timeout(WAIT, self.accepted.recv())
            .await
            .expect("no socket accepted")
            .expect("acceptor stopped")
    }
}

pub(crate) async fn push(socket: &mut ServerSocket, event: &str, data: Value) {
    let text = WireFrame::new(event, data).to_text().unwrap();
    socket.send(Message::Text(text)).await.unwrap();
}

/// Next text frame the client sent.
pub(crate) async fn next_frame(socket: &mut ServerSocket) -> WireFrame {
    loop {
        let message = tokio::time::timeout(WAIT, socket.next())
            .await
            .expect("no frame from client")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = message {
            return WireFrame::from_text(&text).unwrap();
        }
    }
}

/// Poll `cond` until it holds or the wait runs out.
pub(crate) async fn eventually(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
