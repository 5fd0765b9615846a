//! File-backed key/value storage for the signed-in session
//!
//! Persists the session keys written by [`SessionStore`](docflow_link::SessionStore)
//! to a single JSON object on disk with secure file permissions (0600 on Unix).
//!
//! # File Location
//!
//! - Windows: `~/.docflow/session.json`
//! - Linux/macOS: `~/.config/docflow/session.json`
//!
//! # File Format
//!
//! ```json
//! {
//!   "token": "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...",
//!   "user": "{\"id\":7,\"email\":\"ana@uni.edu\",\"role\":\"STUDENT\"}",
//!   "auth-storage": "{\"state\":{...},\"version\":0}"
//! }
//! ```

use docflow_link::{KeyValueStore, LinkError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// JSON file storage
///
/// Every write rewrites the whole file; the map is small.
#[derive(Debug)]
pub struct FileStorage {
    /// Path to the session file
    file_path: PathBuf,

    /// In-memory copy of the file
    cache: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Default session file path
    pub fn default_path() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".docflow").join("session.json")
            } else {
                PathBuf::from(".docflow").join("session.json")
            }
        }

        #[cfg(not(target_os = "windows"))]
        {
            if let Some(config_dir) = dirs::config_dir() {
                config_dir.join("docflow").join("session.json")
            } else if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(".config").join("docflow").join("session.json")
            } else {
                PathBuf::from(".docflow").join("session.json")
            }
        }
    }

    /// Open the session file at the default location
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_path())
    }

    /// Open the session file at a custom location
    pub fn with_path(file_path: PathBuf) -> Result<Self> {
        let cache = Self::load_from_disk(&file_path)?;
        Ok(Self {
            file_path,
            cache: Mutex::new(cache),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn load_from_disk(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            LinkError::StorageError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            LinkError::StorageError(format!("Corrupt session file {}: {}", path.display(), e))
        })
    }

    fn save_to_disk(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LinkError::StorageError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let contents = serde_json::to_string_pretty(entries)?;
        fs::write(&self.file_path, contents).map_err(|e| {
            LinkError::StorageError(format!(
                "Failed to write {}: {}",
                self.file_path.display(),
                e
            ))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.file_path, permissions).map_err(|e| {
                LinkError::StorageError(format!("Failed to set permissions: {}", e))
            })?;
        }

        Ok(())
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned lock still holds a consistent map; every write replaces
        // whole values.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries();
        entries.insert(key.to_string(), value.to_string());
        self.save_to_disk(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries();
        if entries.remove(key).is_some() {
            self.save_to_disk(&entries)?;
        }
        Ok(())
    }
}
