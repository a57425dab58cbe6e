//! The persistent cache handle shared across the client.
//!
//! Values are stored as JSON under fixed keys. A missing key is a normal
//! state (e.g. signed out); a present but undecodable value is an error.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use shock_shared::types::AuthData;

use crate::database::{Database, DATABASE_FILE};
use crate::error::{Result, StoreError};

pub const KEY_AUTH_DATA: &str = "auth_data";
pub const KEY_DEVICE_ID: &str = "device_id";
pub const KEY_NODE_URL: &str = "node_url";

/// Thread-safe key/value cache over a [`Database`].
pub struct Cache {
    db: Mutex<Database>,
}

impl Cache {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open the cache in the platform data directory.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(Database::open_default()?))
    }

    /// Open the cache inside `dir`, creating the directory if needed.
    pub fn open_in_dir(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self::new(Database::open_at(&dir.join(DATABASE_FILE))?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Raw access
    // -----------------------------------------------------------------------

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = self.lock()?.kv_get(key)?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.lock()?.kv_put(key, &raw)
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.lock()?.kv_delete(key)
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    /// The cached auth bundle, `None` when signed out.
    pub fn get_stored_auth_data(&self) -> Result<Option<AuthData>> {
        self.get(KEY_AUTH_DATA)
    }

    /// Store `data`, or clear the credentials when `None`. Other keys are
    /// left alone.
    pub fn write_stored_auth_data(&self, data: Option<&AuthData>) -> Result<()> {
        match data {
            Some(auth) => {
                self.set(KEY_AUTH_DATA, auth)?;
                info!(public_key = %auth.public_key(), "stored auth data");
            }
            None => {
                self.remove(KEY_AUTH_DATA)?;
                info!("cleared auth data");
            }
        }
        Ok(())
    }

    /// The cached token.
    ///
    /// # Errors
    /// [`StoreError::AuthRequired`] when no auth data is cached.
    pub fn get_token(&self) -> Result<String> {
        self.get_stored_auth_data()?
            .map(|auth| auth.auth_data.token)
            .ok_or(StoreError::AuthRequired)
    }

    // -----------------------------------------------------------------------
    // Device / node
    // -----------------------------------------------------------------------

    pub fn get_device_id(&self) -> Result<Option<String>> {
        self.get(KEY_DEVICE_ID)
    }

    /// The device id, generated and persisted on first use.
    pub fn device_id_or_create(&self) -> Result<String> {
        if let Some(id) = self.get_device_id()? {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.set(KEY_DEVICE_ID, &id)?;
        debug!(device_id = %id, "generated device id");
        Ok(id)
    }

    pub fn get_node_url(&self) -> Result<Option<String>> {
        self.get(KEY_NODE_URL)
    }

    pub fn write_node_url(&self, url: Option<&str>) -> Result<()> {
        match url {
            Some(url) => self.set(KEY_NODE_URL, url),
            None => self.remove(KEY_NODE_URL).map(|_| ()),
        }
    }

    /// Wipe every cached entry in one transaction.
    pub fn clear_all_storage(&self) -> Result<()> {
        let removed = self.lock()?.kv_clear()?;
        info!(removed, "cleared all cached storage");
        Ok(())
    }
}
