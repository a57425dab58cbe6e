//! Raw event handler registry.
//!
//! Handlers are keyed by event name and compared by identity, so
//! registering the same `Arc` twice for one event is a no-op. Dispatch
//! snapshots the handler list and invokes it with the lock released, so a
//! handler may register or remove handlers while it runs.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

/// A raw socket event handler.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Wrap a closure as an [`EventHandler`].
pub fn handler<F>(f: F) -> EventHandler
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

fn same_handler(a: &EventHandler, b: &EventHandler) -> bool {
    // Compare data pointers only; vtable pointers are not unique.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`. Returns `false` when this exact
    /// handler was already registered.
    pub fn on(&self, event: &str, handler: EventHandler) -> bool {
        let mut handlers = self.handlers.lock();
        let list = handlers.entry(event.to_string()).or_default();
        if list.iter().any(|h| same_handler(h, &handler)) {
            trace!(event, "handler already registered");
            return false;
        }
        list.push(handler);
        debug!(event, count = list.len(), "registered handler");
        true
    }

    /// Remove `handler` from `event`. Returns whether it was registered.
    pub fn off(&self, event: &str, handler: &EventHandler) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !same_handler(h, handler));
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(event);
        }
        removed
    }

    /// Invoke every handler registered for `event`, in registration order.
    /// Returns how many ran.
    pub fn dispatch(&self, event: &str, data: &Value) -> usize {
        let snapshot: Vec<EventHandler> = match self.handlers.lock().get(event) {
            Some(list) => list.clone(),
            None => return 0,
        };
        for h in &snapshot {
            h(data);
        }
        snapshot.len()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.lock().get(event).map_or(0, Vec::len)
    }
}
