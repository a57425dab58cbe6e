//! Directory of every user the client has heard of.
//!
//! Records are created on first reference and only ever enriched: each
//! source contributes the fields it knows and leaves the rest alone.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::trace;

use shock_shared::types::{Chat, PartialUser, Request, User};

#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user for `public_key`, or the empty user when unknown.
    pub fn get(&self, public_key: &str) -> User {
        self.users
            .read()
            .get(public_key)
            .cloned()
            .unwrap_or_else(|| User::empty(public_key))
    }

    pub fn contains(&self, public_key: &str) -> bool {
        self.users.read().contains_key(public_key)
    }

    pub fn all(&self) -> Vec<User> {
        self.users.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Merge partial records, e.g. post authors or profile lookups.
    pub fn receive<'a, I>(&self, partials: I)
    where
        I: IntoIterator<Item = &'a PartialUser>,
    {
        let mut users = self.users.write();
        for partial in partials {
            if partial.public_key.is_empty() {
                continue;
            }
            users
                .entry(partial.public_key.clone())
                .or_insert_with(|| User::empty(&partial.public_key))
                .merge(partial);
            trace!(public_key = %partial.public_key, "merged user data");
        }
    }

    pub fn receive_chats(&self, chats: &[Chat]) {
        let partials: Vec<PartialUser> = chats.iter().map(Chat::recipient).collect();
        self.receive(&partials);
    }

    pub fn receive_requests(&self, requests: &[Request]) {
        let partials: Vec<PartialUser> = requests.iter().map(Request::counterpart).collect();
        self.receive(&partials);
    }

    pub fn clear(&self) {
        self.users.write().clear();
    }
}
