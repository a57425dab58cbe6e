//! # shock-store
//!
//! Persistent key/value cache for the Shock client, backed by SQLite.
//!
//! The cache holds the authentication bundle, the device id and the node
//! URL. [`Database`] owns the `rusqlite::Connection` and the schema;
//! [`Cache`] is the thread-safe handle the rest of the client shares.

pub mod cache;
pub mod database;
pub mod kv;
pub mod migrations;

mod error;

pub use cache::Cache;
pub use database::Database;
pub use error::{Result, StoreError};
