//! Key/value persistence for the session store.
//!
//! The session store writes three keys (`token`, `user`, `auth-storage`)
//! through this trait so that the same logic works against an in-memory map
//! in tests and a file on disk in the CLI.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{LinkError, Result};

/// Trait for string key/value backends.
///
/// Implementations take `&self` and are shared behind an `Arc`, so any
/// mutation goes through interior mutability.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use docflow_link::auth::KeyValueStore;
///
/// struct EnvStorage;
///
/// impl KeyValueStore for EnvStorage {
///     fn get(&self, key: &str) -> Result<Option<String>> {
///         Ok(std::env::var(format!("DOCFLOW_{}", key)).ok())
///     }
///     fn set(&self, _key: &str, _value: &str) -> Result<()> {
///         Ok(())
///     }
///     fn remove(&self, _key: &str) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait KeyValueStore: Send + Sync {
    /// Returns `Ok(None)` if nothing is stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Returns `Ok(())` even if the key was absent.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store for tests and throwaway sessions. Nothing survives a
/// restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> LinkError {
    LinkError::StorageError("memory storage lock poisoned".to_string())
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| poisoned())?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().map_err(|_| poisoned())?.remove(key);
        Ok(())
    }
}
