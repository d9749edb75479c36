//! Key-value store backings for the cache service
//!
//! Provides the `Store` abstraction the cache composes: a fast in-memory
//! store with process lifetime, and a slower on-disk store that survives
//! restarts. Values are opaque serialized strings at this level; the entry
//! envelope is handled by the service.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

/// Fixed prefix applied to every on-disk entry.
///
/// Namespaces this crate's files inside a shared cache directory and carries
/// the entry schema version, so unrelated files and entries written by other
/// deployed versions are never read or deleted.
pub const NAMESPACE_PREFIX: &str = "plateau-cache-v1__";

/// Errors a store backing can report on write
///
/// Reads never error at this level; anything unreadable is treated as absent.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing ran out of space
    #[error("storage quota exceeded")]
    QuotaExceeded,

    /// Any other I/O failure
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// A single-key-granularity key-value backing
pub trait Store: std::fmt::Debug + Send + Sync {
    /// Returns the raw serialized entry for `key`, if one exists
    fn get(&self, key: &str) -> Option<String>;

    /// Writes the raw serialized entry for `key`
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes `key`; absent keys are not an error
    fn delete(&self, key: &str);

    /// Lists every key currently present in this store's namespace
    fn keys(&self) -> Vec<String>;
}

/// In-memory store backing
///
/// Clones share the same underlying map, so a client holding a clone of the
/// cache observes the same entries as every other client in the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Ok(mut map) = self.entries.lock() {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn delete(&self, key: &str) {
        if let Ok(mut map) = self.entries.lock() {
            map.remove(key);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// On-disk store backing
///
/// Stores each entry as a JSON file named `{NAMESPACE_PREFIX}{key}.json`
/// inside the cache directory. Only files carrying the namespace prefix are
/// ever listed or deleted, so the directory can be shared with other data.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Creates a disk store rooted at the given directory
    ///
    /// The directory is created lazily on first write.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Returns the file path for a cache key
    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", NAMESPACE_PREFIX, key))
    }
}

impl Store for DiskStore {
    fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.entry_path(key)).ok()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.entry_path(key), value).map_err(|e| match e.kind() {
            io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => StoreError::QuotaExceeded,
            _ => StoreError::Io(e),
        })
    }

    fn delete(&self, key: &str) {
        let _ = fs::remove_file(self.entry_path(key));
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| {
                name.strip_prefix(NAMESPACE_PREFIX)
                    .and_then(|rest| rest.strip_suffix(".json"))
                    .map(str::to_string)
            })
            .collect()
    }
}
