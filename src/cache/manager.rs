//! Cache manager for API responses
//!
//! Provides a `CacheManager` that stores serializable data in a namespaced
//! key-value slot with a write timestamp and the deployment ("build") it was
//! written under. Entries expire after a TTL, and a change of build
//! invalidates every entry at once.
//!
//! The cache is an accelerator only: every failure of the underlying store
//! degrades to a miss or a no-op, never to an error.

use std::path::PathBuf;
use std::sync::Arc;

use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::storage::{FileStorage, Storage};

/// Default time-to-live for cache entries (one hour)
pub const DEFAULT_TTL_MS: i64 = 3_600_000;

/// Prefix applied to every key the cache writes
pub const DEFAULT_PREFIX: &str = "fogsift_";

/// Suffix of the reserved key holding the build marker
const BUILD_KEY: &str = "build";

/// Suffix of the key used by the availability probe
const PROBE_KEY: &str = "__probe__";

/// Wrapper struct for cached data in storage
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry<T> {
    /// The cached data
    data: T,
    /// When the data was cached (Unix milliseconds)
    timestamp: i64,
    /// Build marker active when the data was cached
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build_timestamp: Option<i64>,
}

/// Just enough of an entry to rank it for cleanup
#[derive(Debug, Deserialize)]
struct EntryStamp {
    timestamp: i64,
}

/// Manages reading and writing cached data
///
/// Cloning is cheap and every clone shares the same storage and clock.
#[derive(Debug, Clone)]
pub struct CacheManager {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    prefix: String,
    ttl_ms: i64,
}

impl CacheManager {
    /// Creates a CacheManager over the given storage with default settings
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            prefix: DEFAULT_PREFIX.to_string(),
            ttl_ms: DEFAULT_TTL_MS,
        }
    }

    /// Creates a CacheManager using the XDG-compliant cache directory
    ///
    /// Uses `~/.cache/fogsift/` on Linux, or the equivalent path on other
    /// platforms. Returns `None` if the directory cannot be determined.
    pub fn open_default() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "fogsift")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a file-backed CacheManager storing entries in `cache_dir`
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self::new(Arc::new(FileStorage::new(cache_dir)))
    }

    /// Sets how long entries stay fresh, in milliseconds
    pub fn with_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// Sets the namespace prefix for storage keys
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time-to-live in milliseconds
    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn build_key(&self) -> String {
        self.storage_key(BUILD_KEY)
    }

    /// Whether the underlying store accepts a trial write and delete
    pub fn available(&self) -> bool {
        let probe = self.storage_key(PROBE_KEY);
        match self
            .storage
            .set_item(&probe, PROBE_KEY)
            .and_then(|()| self.storage.remove_item(&probe))
        {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "cache storage unavailable");
                false
            }
        }
    }

    /// Reads data from the cache
    ///
    /// Returns `None` when storage is unavailable, the entry is missing or
    /// cannot be parsed, the entry has outlived the TTL (the entry is
    /// removed), or the entry was written under a different build than the
    /// current one (the whole cache is cleared).
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.available() {
            return None;
        }

        let raw = match self.storage.get_item(&self.storage_key(key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                return None;
            }
        };

        let entry: CacheEntry<Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, error = %e, "cache entry unreadable");
                return None;
            }
        };

        if self.clock.now_ms().saturating_sub(entry.timestamp) > self.ttl_ms {
            debug!(key, "cache expired");
            self.remove(key);
            return None;
        }

        if let (Some(current), Some(built)) = (self.current_build(), entry.build_timestamp) {
            if current != built {
                debug!(key, current, built, "cache build changed");
                self.clear();
                return None;
            }
        }

        match serde_json::from_value(entry.data) {
            Ok(data) => {
                debug!(key, "cache hit");
                Some(data)
            }
            Err(e) => {
                debug!(key, error = %e, "cached data has unexpected shape");
                None
            }
        }
    }

    /// Writes data to the cache
    ///
    /// The entry is tagged with the current build marker, or with a
    /// top-level `buildTimestamp` field of the data when no marker is set.
    /// If the store rejects the write, the oldest half of the cache is
    /// evicted and this write is dropped.
    pub fn set<T: Serialize>(&self, key: &str, data: &T) {
        if !self.available() {
            return;
        }

        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(e) => {
                warn!(key, error = %e, "cache data not serializable");
                return;
            }
        };

        let build_timestamp = self
            .current_build()
            .or_else(|| data.get("buildTimestamp").and_then(Value::as_i64));

        let entry = CacheEntry {
            data,
            timestamp: self.clock.now_ms(),
            build_timestamp,
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "cache entry not serializable");
                return;
            }
        };

        match self.storage.set_item(&self.storage_key(key), &json) {
            Ok(()) => debug!(key, "cache set"),
            Err(e) => {
                warn!(key, error = %e, "cache write failed");
                self.cleanup();
            }
        }
    }

    /// Removes a single cache entry
    pub fn remove(&self, key: &str) {
        if !self.available() {
            return;
        }
        if let Err(e) = self.storage.remove_item(&self.storage_key(key)) {
            warn!(key, error = %e, "cache remove failed");
        }
    }

    /// Whether `get` would return data for `key`
    ///
    /// Like `get`, this evicts expired and stale entries it comes across.
    pub fn is_valid(&self, key: &str) -> bool {
        self.get::<Value>(key).is_some()
    }

    /// Removes every cache entry, keeping the build marker
    pub fn clear(&self) {
        let removed = self.remove_namespaced(false);
        debug!(removed, "cache cleared");
    }

    /// Removes every cache entry and the build marker
    pub fn reset(&self) {
        let removed = self.remove_namespaced(true);
        debug!(removed, "cache reset");
    }

    /// Records the build currently deployed
    pub fn set_build_timestamp(&self, timestamp: i64) {
        if !self.available() {
            return;
        }
        match self.storage.set_item(&self.build_key(), &timestamp.to_string()) {
            Ok(()) => debug!(timestamp, "cache build marker set"),
            Err(e) => warn!(error = %e, "cache build marker write failed"),
        }
    }

    /// The recorded build marker, if any
    pub fn current_build(&self) -> Option<i64> {
        if !self.available() {
            return None;
        }
        match self.storage.get_item(&self.build_key()) {
            Ok(stored) => stored.and_then(|s| s.trim().parse().ok()),
            Err(e) => {
                warn!(error = %e, "cache build marker read failed");
                None
            }
        }
    }

    /// Keys of all stored entries, without the namespace prefix
    ///
    /// Entries are listed whether or not they are still fresh.
    pub fn keys(&self) -> Vec<String> {
        if !self.available() {
            return Vec::new();
        }
        let build_key = self.build_key();
        let mut keys: Vec<String> = self
            .namespaced_keys()
            .into_iter()
            .filter(|k| *k != build_key)
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect();
        keys.sort();
        keys
    }

    /// Storage keys under this cache's prefix, the build marker included
    fn namespaced_keys(&self) -> Vec<String> {
        match self.storage.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.prefix))
                .collect(),
            Err(e) => {
                warn!(error = %e, "cache key listing failed");
                Vec::new()
            }
        }
    }

    fn remove_namespaced(&self, include_build: bool) -> usize {
        if !self.available() {
            return 0;
        }
        let build_key = self.build_key();
        let mut removed = 0;
        for key in self.namespaced_keys() {
            if key == build_key && !include_build {
                continue;
            }
            match self.storage.remove_item(&key) {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "cache remove failed"),
            }
        }
        removed
    }

    /// Frees space after a failed write
    ///
    /// Unreadable entries are deleted outright. The remaining entries are
    /// ordered by write time and the oldest half (rounded up) is deleted.
    /// Returns how many readable entries were evicted.
    fn cleanup(&self) -> usize {
        if !self.available() {
            return 0;
        }

        let build_key = self.build_key();
        let mut entries: Vec<(String, i64)> = Vec::new();

        for key in self.namespaced_keys() {
            if key == build_key {
                continue;
            }
            let raw = match self.storage.get_item(&key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key = %key, error = %e, "cache cleanup read failed");
                    continue;
                }
            };
            match serde_json::from_str::<EntryStamp>(&raw) {
                Ok(stamp) => entries.push((key, stamp.timestamp)),
                Err(_) => {
                    debug!(key = %key, "cache cleanup removing corrupt entry");
                    let _ = self.storage.remove_item(&key);
                }
            }
        }

        entries.sort_by_key(|(_, timestamp)| *timestamp);
        let to_remove = entries.len().div_ceil(2);
        for (key, _) in entries.iter().take(to_remove) {
            if let Err(e) = self.storage.remove_item(key) {
                warn!(key = %key, error = %e, "cache cleanup remove failed");
            }
        }

        debug!(removed = to_remove, "cache cleanup");
        to_remove
    }
}
