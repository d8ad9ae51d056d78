//! Persistent key-value store.
//!
//! Backends implement the raw string interface in [`KeyValueStore`];
//! services go through [`JsonStore`] which encodes values as JSON.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Storage keys shared by the services
pub mod keys {
    pub const IS_LOGGED_IN: &str = "isLoggedIn";
    pub const USER: &str = "user";
    pub const USERS: &str = "users";
    pub const CREDITS: &str = "userCredits";
    pub const TRANSACTIONS: &str = "creditTransactions";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const FREE_CREDITS_EXPIRY: &str = "freeCreditsExpiry";
    pub const TUTORIAL_SEEN: &str = "hasSeenTutorial";
}

/// Synchronous string key/value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;
    fn set(&self, key: &str, value: String) -> StoreResult<()>;
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// JSON layer over a shared backend
#[derive(Clone)]
pub struct JsonStore {
    inner: Arc<dyn KeyValueStore>,
}

impl JsonStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    /// Volatile store, mostly for tests
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Open the backend selected in configuration
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let backend: Arc<dyn KeyValueStore> = match config.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::File => Arc::new(FileStore::open(&config.path)?),
        };
        Ok(Self::new(backend))
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.inner.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.inner.set(key, raw)
    }

    pub fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key)
    }

    pub fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.inner.get(key)?.is_some())
    }

    /// Whether the onboarding tutorial was dismissed
    pub fn tutorial_seen(&self) -> StoreResult<bool> {
        Ok(self.get_json::<bool>(keys::TUTORIAL_SEEN)?.unwrap_or(false))
    }

    pub fn mark_tutorial_seen(&self) -> StoreResult<()> {
        self.set_json(keys::TUTORIAL_SEEN, &true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip_and_remove() {
        let store = JsonStore::in_memory();
        store.set_json(keys::CREDITS, &6u64).unwrap();
        assert_eq!(store.get_json::<u64>(keys::CREDITS).unwrap(), Some(6));

        store.remove(keys::CREDITS).unwrap();
        assert!(!store.contains(keys::CREDITS).unwrap());
    }

    #[test]
    fn test_corrupt_value_is_an_error() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set(keys::NOTIFICATIONS, "[{not json".to_string())
            .unwrap();
        let store = JsonStore::new(backend);

        let err = store
            .get_json::<Vec<serde_json::Value>>(keys::NOTIFICATIONS)
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref key, .. } if key == "notifications"));
    }

    #[test]
    fn test_tutorial_flag() {
        let store = JsonStore::in_memory();
        assert!(!store.tutorial_seen().unwrap());
        store.mark_tutorial_seen().unwrap();
        assert!(store.tutorial_seen().unwrap());
    }
}
