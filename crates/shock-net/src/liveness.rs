//! Heartbeat tracking.
//!
//! The server pings with `SET_LAST_SEEN_APP` while it is talking to us.
//! A recent ping is a stronger signal than the transport merely being open.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

#[derive(Debug, Clone, Copy)]
struct Heartbeat {
    received_at: Instant,
    server_timestamp: Option<u64>,
}

#[derive(Debug, Default)]
pub struct Liveness {
    last: Mutex<Option<Heartbeat>>,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a heartbeat, with the server's own timestamp if it sent one.
    pub fn record(&self, server_timestamp: Option<u64>) {
        trace!(?server_timestamp, "heartbeat");
        *self.last.lock() = Some(Heartbeat {
            received_at: Instant::now(),
            server_timestamp,
        });
    }

    /// Time since the last heartbeat, `None` if there never was one.
    pub fn since_last(&self) -> Option<Duration> {
        self.last.lock().map(|hb| hb.received_at.elapsed())
    }

    /// The server's timestamp from the last heartbeat that carried one.
    pub fn last_server_timestamp(&self) -> Option<u64> {
        self.last.lock().and_then(|hb| hb.server_timestamp)
    }

    /// Whether a heartbeat arrived within `window`.
    pub fn is_alive(&self, window: Duration) -> bool {
        self.since_last().is_some_and(|elapsed| elapsed <= window)
    }

    pub fn reset(&self) {
        *self.last.lock() = None;
    }
}
