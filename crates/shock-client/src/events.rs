//! The state mirror: last-known values of server-driven entities.
//!
//! Each entity lives in a [`Store`], a current value plus an ordered list of
//! listeners. Subscribing replays the current value immediately. Setting a
//! value notifies every listener, in subscription order, before returning.
//!
//! All stores of one [`StateMirror`] share a re-entrant lock held for the
//! whole of a `set` (or a subscribe replay), so notification rounds never
//! overlap across threads. A listener may itself read the mirror, subscribe,
//! or set another entity on the same thread.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, trace};

use shock_shared::protocol::InboundEvent;
use shock_shared::types::{Chat, Request};

use crate::users::UserDirectory;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// A current value with replay-on-subscribe listeners.
pub struct Store<T> {
    name: &'static str,
    value: Mutex<T>,
    listeners: Arc<Mutex<Listeners<T>>>,
    round: Arc<ReentrantMutex<()>>,
}

impl<T> Store<T>
where
    T: Clone + Send + 'static,
{
    fn new(name: &'static str, initial: T, round: Arc<ReentrantMutex<()>>) -> Self {
        Self {
            name,
            value: Mutex::new(initial),
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
            round,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The last-known value.
    pub fn get(&self) -> T {
        self.value.lock().clone()
    }

    /// Read the value in place.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.lock())
    }

    /// Call `listener` with the current value now, then with every later
    /// value until unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let _round = self.round.lock();
        let listener: Listener<T> = Arc::new(listener);

        let id = {
            let mut listeners = self.listeners.lock();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Arc::clone(&listener)));
            id
        };

        let current = self.get();
        listener(&current);
        trace!(store = self.name, id, "subscribed");

        let listeners: Weak<Mutex<Listeners<T>>> = Arc::downgrade(&self.listeners);
        let name = self.name;
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(listeners) = listeners.upgrade() {
                    listeners.lock().entries.retain(|(entry, _)| *entry != id);
                    trace!(store = name, id, "unsubscribed");
                }
            })),
        }
    }

    /// Replace the value and notify every listener before returning.
    pub fn set(&self, value: T) {
        let _round = self.round.lock();
        *self.value.lock() = value.clone();

        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in &snapshot {
            listener(&value);
        }
        trace!(store = self.name, listeners = snapshot.len(), "notified");
    }

    /// Replace the value with `f(current)` without another `set` slipping in
    /// between. When `f` returns `None` nothing changes and no listener runs.
    pub fn update(&self, f: impl FnOnce(&T) -> Option<T>) -> bool {
        let _round = self.round.lock();
        match f(&self.get()) {
            Some(next) => {
                self.set(next);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }
}

/// Handle returned by [`Store::subscribe`].
#[must_use = "call unsubscribe() to stop receiving updates"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Mirror of everything the server pushes.
pub struct StateMirror {
    chats: Store<Vec<Chat>>,
    sent_requests: Store<Vec<Request>>,
    received_requests: Store<Vec<Request>>,
    handshake_address: Store<Option<String>>,
    bio: Store<Option<String>>,
    users: UserDirectory,
}

impl StateMirror {
    pub fn new() -> Self {
        let round = Arc::new(ReentrantMutex::new(()));
        Self {
            chats: Store::new("chats", Vec::new(), Arc::clone(&round)),
            sent_requests: Store::new("sent_requests", Vec::new(), Arc::clone(&round)),
            received_requests: Store::new("received_requests", Vec::new(), Arc::clone(&round)),
            handshake_address: Store::new("handshake_address", None, Arc::clone(&round)),
            bio: Store::new("bio", None, round),
            users: UserDirectory::new(),
        }
    }

    pub fn chats(&self) -> &Store<Vec<Chat>> {
        &self.chats
    }

    pub fn sent_requests(&self) -> &Store<Vec<Request>> {
        &self.sent_requests
    }

    pub fn received_requests(&self) -> &Store<Vec<Request>> {
        &self.received_requests
    }

    pub fn handshake_address(&self) -> &Store<Option<String>> {
        &self.handshake_address
    }

    pub fn bio(&self) -> &Store<Option<String>> {
        &self.bio
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    /// Apply a server push. Snapshots replace the whole collection; users
    /// are merged from chats and requests before listeners run.
    pub fn apply(&self, event: InboundEvent) {
        match event {
            InboundEvent::Chats(chats) => {
                debug!(count = chats.len(), "received chats");
                self.users.receive_chats(&chats);
                self.chats.set(chats);
            }
            InboundEvent::SentRequests(requests) => {
                debug!(count = requests.len(), "received sent requests");
                self.users.receive_requests(&requests);
                self.sent_requests.set(requests);
            }
            InboundEvent::ReceivedRequests(requests) => {
                debug!(count = requests.len(), "received incoming requests");
                self.users.receive_requests(&requests);
                self.received_requests.set(requests);
            }
            InboundEvent::HandshakeAddress(address) => {
                debug!("received handshake address");
                self.handshake_address.set(Some(address));
            }
            InboundEvent::Bio(bio) => {
                debug!("received bio");
                self.bio.set(bio);
            }
            InboundEvent::LastSeenApp(_) => {}
        }
    }

    /// Back to the never-received defaults. Subscribers are notified and
    /// stay subscribed.
    pub fn reset(&self) {
        self.chats.set(Vec::new());
        self.sent_requests.set(Vec::new());
        self.received_requests.set(Vec::new());
        self.handshake_address.set(None);
        self.bio.set(None);
        self.users.clear();
        debug!("state mirror reset");
    }
}

impl Default for StateMirror {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &T| sink.lock().push(v.clone()))
    }

    #[test]
    fn test_subscribe_replays_current_value() {
        let mirror = StateMirror::new();
        mirror.bio().set(Some("hello".into()));

        let (seen, listener) = recorder();
        let sub = mirror.bio().subscribe(listener);

        assert_eq!(*seen.lock(), vec![Some("hello".to_string())]);
        sub.unsubscribe();
    }

    #[test]
    fn test_subscribe_replays_default_when_never_set() {
        let mirror = StateMirror::new();
        let (seen, listener) = recorder();
        let sub = mirror.chats().subscribe(listener);
        assert_eq!(*seen.lock(), vec![Vec::<Chat>::new()]);
        sub.unsubscribe();
    }

    #[test]
    fn test_sets_arrive_in_order() {
        let mirror = StateMirror::new();
        let (seen, listener) = recorder();
        let sub = mirror.handshake_address().subscribe(listener);

        mirror.handshake_address().set(Some("v1".into()));
        mirror.handshake_address().set(Some("v2".into()));

        assert_eq!(
            *seen.lock(),
            vec![None, Some("v1".to_string()), Some("v2".to_string())]
        );
        sub.unsubscribe();
    }

    #[test]
    fn test_listeners_notified_in_subscription_order() {
        let mirror = StateMirror::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let subs: Vec<Subscription> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                mirror.bio().subscribe(move |v: &Option<String>| {
                    if v.is_some() {
                        order.lock().push(i);
                    }
                })
            })
            .collect();

        mirror.bio().set(Some("x".into()));
        assert_eq!(*order.lock(), vec![0, 1, 2]);

        for sub in subs {
            sub.unsubscribe();
        }
    }

    #[test]
    fn test_unsubscribe_stops_updates() {
        let mirror = StateMirror::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = mirror.chats().subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        mirror.chats().set(vec![Chat::new("a")]);
        sub.unsubscribe();
        mirror.chats().set(vec![Chat::new("b")]);

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(mirror.chats().listener_count(), 0);
    }

    #[test]
    fn test_listener_can_read_mirror() {
        let mirror = Arc::new(StateMirror::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let m = Arc::clone(&mirror);
        let sink = Arc::clone(&seen);
        let sub = mirror.chats().subscribe(move |chats: &Vec<Chat>| {
            let current = m.chats().get();
            sink.lock().push((chats.len(), current.len()));
        });

        mirror.chats().set(vec![Chat::new("a"), Chat::new("b")]);
        assert_eq!(*seen.lock(), vec![(0, 0), (2, 2)]);
        sub.unsubscribe();
    }

    #[test]
    fn test_concurrent_sets_do_not_interleave() {
        let mirror = Arc::new(StateMirror::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Vec::new();

        for tag in ["a", "b"] {
            let log = Arc::clone(&log);
            subs.push(mirror.bio().subscribe(move |v: &Option<String>| {
                if let Some(v) = v {
                    log.lock().push(format!("{tag}-start-{v}"));
                    std::thread::sleep(std::time::Duration::from_millis(2));
                    log.lock().push(format!("{tag}-end-{v}"));
                }
            }));
        }

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let mirror = Arc::clone(&mirror);
                std::thread::spawn(move || mirror.bio().set(Some(i.to_string())))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let log = log.lock();
        assert_eq!(log.len(), 16);
        for round in log.chunks(4) {
            let value = round[0].rsplit('-').next().unwrap();
            assert!(round.iter().all(|entry| entry.ends_with(value)));
            assert!(round[0].starts_with("a-start"));
            assert!(round[3].starts_with("b-end"));
        }
        drop(log);

        for sub in subs {
            sub.unsubscribe();
        }
    }

    #[test]
    fn test_rounds_do_not_overlap_across_entities() {
        let mirror = Arc::new(StateMirror::new());
        let log = Arc::new(Mutex::new(Vec::<String>::new()));

        let chats_sub = {
            let log = Arc::clone(&log);
            let name = mirror.chats().name();
            mirror.chats().subscribe(move |chats: &Vec<Chat>| {
                let Some(first) = chats.first() else { return };
                let value = &first.recipient_public_key;
                log.lock().push(format!("{name}-start-{value}"));
                std::thread::sleep(std::time::Duration::from_millis(3));
                log.lock().push(format!("{name}-end-{value}"));
            })
        };
        let bio_sub = {
            let log = Arc::clone(&log);
            let name = mirror.bio().name();
            mirror.bio().subscribe(move |bio: &Option<String>| {
                let Some(value) = bio else { return };
                log.lock().push(format!("{name}-start-{value}"));
                std::thread::sleep(std::time::Duration::from_millis(3));
                log.lock().push(format!("{name}-end-{value}"));
            })
        };

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let mirror = Arc::clone(&mirror);
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        mirror.chats().set(vec![Chat::new(format!("c{i}"))]);
                    } else {
                        mirror.bio().set(Some(format!("b{i}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let log = log.lock();
        assert_eq!(log.len(), 12);
        for pair in log.chunks(2) {
            let start = pair[0].replacen("-start-", "-", 1);
            let end = pair[1].replacen("-end-", "-", 1);
            assert!(pair[0].contains("-start-"), "{log:?}");
            assert_eq!(start, end, "{log:?}");
        }
        assert!(log.iter().any(|e| e.starts_with("chats-")));
        assert!(log.iter().any(|e| e.starts_with("bio-")));
        drop(log);

        assert_eq!(mirror.chats().read(|chats| chats.len()), 1);
        chats_sub.unsubscribe();
        bio_sub.unsubscribe();
    }

    #[test]
    fn test_apply_chats_feeds_users() {
        let mirror = StateMirror::new();
        let mut chat = Chat::new("pk1");
        chat.recipient_display_name = Some("bob".into());

        mirror.apply(InboundEvent::Chats(vec![chat.clone()]));

        assert_eq!(mirror.chats().get(), vec![chat]);
        assert_eq!(mirror.users().get("pk1").display_name.as_deref(), Some("bob"));
    }

    #[test]
    fn test_reset_notifies_defaults() {
        let mirror = StateMirror::new();
        mirror.apply(InboundEvent::HandshakeAddress("addr".into()));
        mirror.apply(InboundEvent::Chats(vec![Chat::new("pk1")]));

        let (seen, listener) = recorder();
        let sub = mirror.handshake_address().subscribe(listener);
        mirror.reset();

        assert_eq!(*seen.lock(), vec![Some("addr".to_string()), None]);
        assert!(mirror.chats().get().is_empty());
        assert!(mirror.users().is_empty());
        sub.unsubscribe();
    }
}
