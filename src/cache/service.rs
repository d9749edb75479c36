//! Two-tier cache service for API responses
//!
//! Composes a fast in-memory store with a best-effort on-disk store. The
//! memory tier is authoritative for the process lifetime; the disk tier
//! survives restarts and seeds the memory tier on lookup. Entries carry an
//! absolute expiry timestamp and are lazily evicted when a read or sweep
//! observes that they have expired.
//!
//! Cache operations never return errors: serialization failures, quota
//! conditions, and corrupt on-disk records are handled internally so callers
//! can treat the cache as strictly best-effort.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::store::{DiskStore, MemoryStore, Store, StoreError};

/// On-disk and in-memory entry envelope
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    /// The cached payload
    value: T,
    /// When the payload was cached
    cached_at: DateTime<Utc>,
    /// When the entry stops being served by default
    expires_at: DateTime<Utc>,
}

/// Envelope view that only reads the expiry, for sweeps over unknown payloads
#[derive(Debug, Deserialize)]
struct EnvelopeExpiry {
    expires_at: DateTime<Utc>,
}

/// Hit/miss counters and the last sweep timestamp
#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    last_cleanup: Option<DateTime<Utc>>,
}

/// A lookup result from [`CacheService::peek`] that reports freshness
#[derive(Debug)]
pub struct Cached<T> {
    /// The cached payload
    pub value: T,
    /// Whether the entry was past its expiry when read
    pub expired: bool,
}

/// Snapshot of cache state returned by [`CacheService::stats`]
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of lookups served from either tier
    pub hits: u64,
    /// Number of lookups that found nothing servable
    pub misses: u64,
    /// Hits as a percentage of all lookups; 0 when there were none
    pub hit_ratio: f64,
    /// Entries currently held in the memory tier
    pub memory_items: usize,
    /// Entries currently held in the disk tier
    pub disk_items: usize,
    /// Approximate memory-tier size in human-readable units
    pub memory_size: String,
    /// Approximate disk-tier size in human-readable units
    pub disk_size: String,
    /// When the last expiry sweep ran, if one has
    pub last_cleanup: Option<DateTime<Utc>>,
}

/// Two-tier TTL cache shared by all API clients
///
/// Constructed once at the application's composition root and handed to each
/// client; clones share the same memory tier and counters. The disk tier is
/// optional so the cache degrades to memory-only when no cache directory is
/// available or persistence is disabled.
#[derive(Debug, Clone)]
pub struct CacheService {
    memory: MemoryStore,
    disk: Option<Arc<dyn Store>>,
    counters: Arc<Mutex<Counters>>,
}

impl CacheService {
    /// Creates a cache backed by the XDG cache directory
    ///
    /// Uses `~/.cache/plateau-water/` on Linux, or the platform equivalent.
    /// Falls back to memory-only when the cache directory cannot be
    /// determined (e.g. no home directory).
    pub fn new() -> Self {
        let disk = ProjectDirs::from("", "", "plateau-water")
            .map(|dirs| Arc::new(DiskStore::new(dirs.cache_dir().to_path_buf())) as Arc<dyn Store>);
        if disk.is_none() {
            log::warn!("no cache directory available, persistence disabled");
        }
        Self {
            memory: MemoryStore::new(),
            disk,
            counters: Arc::new(Mutex::new(Counters::default())),
        }
    }

    /// Creates a cache persisting to a specific directory
    ///
    /// Useful for testing or when a specific cache location is needed.
    pub fn with_dir(dir: std::path::PathBuf) -> Self {
        Self::with_store(Arc::new(DiskStore::new(dir)))
    }

    /// Creates a cache over a caller-supplied persistent store
    pub fn with_store(disk: Arc<dyn Store>) -> Self {
        Self {
            memory: MemoryStore::new(),
            disk: Some(disk),
            counters: Arc::new(Mutex::new(Counters::default())),
        }
    }

    /// Creates a cache with no persistent tier
    pub fn memory_only() -> Self {
        Self {
            memory: MemoryStore::new(),
            disk: None,
            counters: Arc::new(Mutex::new(Counters::default())),
        }
    }

    /// Looks up an unexpired entry
    ///
    /// Checks the memory tier first, then the disk tier; a disk hit is
    /// promoted into memory so later reads avoid the slower tier. Expired or
    /// corrupt entries encountered along the way are deleted and treated as
    /// absent. Returns `None` only when no servable entry exists, so a cached
    /// empty value is still `Some`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_opts(key, false)
    }

    /// Looks up an entry, optionally serving expired data
    ///
    /// `allow_expired` is the degraded fallback used when an upstream API is
    /// down: an entry past its expiry is still returned instead of being
    /// evicted. It is never the default read path.
    pub fn get_opts<T: DeserializeOwned>(&self, key: &str, allow_expired: bool) -> Option<T> {
        let now = Utc::now();

        if let Some(raw) = self.memory.get(key) {
            match serde_json::from_str::<Envelope<T>>(&raw) {
                Ok(envelope) if now < envelope.expires_at || allow_expired => {
                    self.record_hit();
                    return Some(envelope.value);
                }
                Ok(_) => self.memory.delete(key),
                Err(e) => {
                    log::warn!("dropping unreadable memory entry {}: {}", key, e);
                    self.memory.delete(key);
                }
            }
        }

        if let Some(ref disk) = self.disk {
            if let Some(raw) = disk.get(key) {
                match serde_json::from_str::<Envelope<T>>(&raw) {
                    Ok(envelope) if now < envelope.expires_at || allow_expired => {
                        // Promote so the next read stays in memory
                        let _ = self.memory.set(key, &raw);
                        self.record_hit();
                        return Some(envelope.value);
                    }
                    Ok(_) => disk.delete(key),
                    Err(e) => {
                        log::warn!("deleting corrupt cache file for {}: {}", key, e);
                        disk.delete(key);
                    }
                }
            }
        }

        self.record_miss();
        None
    }

    /// Looks up an entry without evicting it, reporting its freshness
    ///
    /// Unlike [`CacheService::get`], an expired entry is returned with
    /// `expired` set instead of being deleted, so a caller about to refresh
    /// from the network can hold onto the stale copy as a fallback. A fresh
    /// entry counts as a hit; an expired or absent one counts as a miss.
    /// Corrupt entries are still deleted and read as absent.
    pub fn peek<T: DeserializeOwned>(&self, key: &str) -> Option<Cached<T>> {
        let now = Utc::now();

        if let Some(raw) = self.memory.get(key) {
            match serde_json::from_str::<Envelope<T>>(&raw) {
                Ok(envelope) => {
                    let expired = now >= envelope.expires_at;
                    if expired {
                        self.record_miss();
                    } else {
                        self.record_hit();
                    }
                    return Some(Cached {
                        value: envelope.value,
                        expired,
                    });
                }
                Err(e) => {
                    log::warn!("dropping unreadable memory entry {}: {}", key, e);
                    self.memory.delete(key);
                }
            }
        }

        if let Some(ref disk) = self.disk {
            if let Some(raw) = disk.get(key) {
                match serde_json::from_str::<Envelope<T>>(&raw) {
                    Ok(envelope) => {
                        let expired = now >= envelope.expires_at;
                        if expired {
                            self.record_miss();
                        } else {
                            let _ = self.memory.set(key, &raw);
                            self.record_hit();
                        }
                        return Some(Cached {
                            value: envelope.value,
                            expired,
                        });
                    }
                    Err(e) => {
                        log::warn!("deleting corrupt cache file for {}: {}", key, e);
                        disk.delete(key);
                    }
                }
            }
        }

        self.record_miss();
        None
    }

    /// Stores a value with the given TTL in both tiers
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        self.set_opts(key, value, ttl, true)
    }

    /// Stores a value, optionally skipping the persistent tier
    ///
    /// The memory write is unconditional. The disk write is best-effort: a
    /// quota failure triggers one expired-entry reclamation pass and exactly
    /// one retry, and every persistence failure is logged and swallowed. An
    /// empty key is a no-op.
    pub fn set_opts<T: Serialize>(&self, key: &str, value: &T, ttl: Duration, persist: bool) {
        if key.is_empty() {
            return;
        }

        let now = Utc::now();
        let envelope = Envelope {
            value,
            cached_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        };
        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };

        let _ = self.memory.set(key, &raw);

        if !persist {
            return;
        }
        let Some(ref disk) = self.disk else {
            return;
        };

        match disk.set(key, &raw) {
            Ok(()) => {}
            Err(StoreError::QuotaExceeded) => {
                log::warn!("cache storage full, reclaiming expired entries");
                self.sweep_store(disk.as_ref(), Utc::now());
                if let Err(e) = disk.set(key, &raw) {
                    log::warn!("cache write for {} still failing after reclaim: {}", key, e);
                }
            }
            Err(e) => {
                log::warn!("failed to persist cache entry {}: {}", key, e);
            }
        }
    }

    /// Deletes a key from both tiers; absent keys are not an error
    pub fn remove(&self, key: &str) {
        self.memory.delete(key);
        if let Some(ref disk) = self.disk {
            disk.delete(key);
        }
    }

    /// Empties the cache and resets counters
    ///
    /// Only keys inside this cache's namespace are deleted from disk;
    /// unrelated files in the same directory are left alone.
    pub fn clear(&self) {
        for key in self.memory.keys() {
            self.memory.delete(&key);
        }
        if let Some(ref disk) = self.disk {
            for key in disk.keys() {
                disk.delete(&key);
            }
        }
        if let Ok(mut counters) = self.counters.lock() {
            *counters = Counters::default();
        }
    }

    /// Deletes every expired entry across both tiers
    ///
    /// Returns the number of distinct keys removed; a key expired in both
    /// tiers counts once. Also records the sweep timestamp reported by
    /// [`CacheService::stats`].
    pub fn clear_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed: HashSet<String> = HashSet::new();

        removed.extend(self.sweep_store(&self.memory, now));
        if let Some(ref disk) = self.disk {
            removed.extend(self.sweep_store(disk.as_ref(), now));
        }

        if let Ok(mut counters) = self.counters.lock() {
            counters.last_cleanup = Some(now);
        }
        removed.len()
    }

    /// Deletes expired (or unreadable) entries from one store
    fn sweep_store<S: Store + ?Sized>(&self, store: &S, now: DateTime<Utc>) -> Vec<String> {
        let mut removed = Vec::new();
        for key in store.keys() {
            let Some(raw) = store.get(&key) else {
                continue;
            };
            let expired = match serde_json::from_str::<EnvelopeExpiry>(&raw) {
                Ok(envelope) => now >= envelope.expires_at,
                // Unreadable entries are dead weight either way
                Err(_) => true,
            };
            if expired {
                store.delete(&key);
                removed.push(key);
            }
        }
        removed
    }

    /// Reports counters, per-tier sizes, and the last sweep time
    pub fn stats(&self) -> CacheStats {
        let (hits, misses, last_cleanup) = self
            .counters
            .lock()
            .map(|c| (c.hits, c.misses, c.last_cleanup))
            .unwrap_or((0, 0, None));

        let total = hits + misses;
        let hit_ratio = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        };

        let memory_keys = self.memory.keys();
        let memory_bytes: u64 = memory_keys
            .iter()
            .filter_map(|key| self.memory.get(key))
            .map(|raw| raw.len() as u64)
            .sum();

        let (disk_items, disk_bytes) = match self.disk {
            Some(ref disk) => {
                let keys = disk.keys();
                let bytes: u64 = keys
                    .iter()
                    .filter_map(|key| disk.get(key))
                    .map(|raw| raw.len() as u64)
                    .sum();
                (keys.len(), bytes)
            }
            None => (0, 0),
        };

        CacheStats {
            hits,
            misses,
            hit_ratio,
            memory_items: memory_keys.len(),
            disk_items,
            memory_size: format_bytes(memory_bytes),
            disk_size: format_bytes(disk_bytes),
            last_cleanup,
        }
    }

    fn record_hit(&self) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.hits += 1;
        }
    }

    fn record_miss(&self) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.misses += 1;
        }
    }
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a byte count in human-readable units
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes >= MB {
        format!("{:.1} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes / KB)
    } else {
        format!("{} B", bytes as u64)
    }
}
