//! Behavioural tests for the cache through its public API
//!
//! Covers expiry, build invalidation, degradation when storage is unusable,
//! and the eviction that follows a rejected write.

use std::sync::Arc;

use fogsift::cache::{
    CacheManager, ManualClock, MemoryStorage, Storage, StorageError, DEFAULT_TTL_MS,
};
use proptest::prelude::*;
use serde_json::{json, Value};

/// A store that can be read but rejects every write and delete
#[derive(Debug)]
struct ReadOnlyStorage {
    inner: MemoryStorage,
}

impl ReadOnlyStorage {
    fn with_entry(key: &str, raw: &str) -> Self {
        let inner = MemoryStorage::new();
        inner.set_item(key, raw).unwrap();
        Self { inner }
    }
}

impl Storage for ReadOnlyStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key)
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("read-only".to_string()))
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("read-only".to_string()))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        self.inner.keys()
    }
}

fn cache_with_clock(storage: Arc<dyn Storage>, start_ms: i64) -> (CacheManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_ms));
    let cache = CacheManager::new(storage).with_clock(clock.clone());
    (cache, clock)
}

#[test]
fn ttl_expiry_removes_entry_from_storage() {
    let storage = Arc::new(MemoryStorage::new());
    let (cache, clock) = cache_with_clock(storage.clone(), 10_000);

    for key in ["/wiki/index.json", "/wiki/sitemap.json", "/articles.json"] {
        cache.set(key, &json!({"key": key}));
    }
    clock.advance(DEFAULT_TTL_MS + 1);

    for key in ["/wiki/index.json", "/wiki/sitemap.json", "/articles.json"] {
        assert_eq!(cache.get::<Value>(key), None);
        assert!(storage.get_item(&format!("fogsift_{}", key)).unwrap().is_none());
    }
}

#[test]
fn fresh_entry_round_trips_unchanged() {
    let (cache, _clock) = cache_with_clock(Arc::new(MemoryStorage::new()), 0);
    let data = json!({"categories": [{"id": 10, "pages": ["fog", "sift"]}], "count": 2});

    cache.set("/wiki/index.json", &data);

    assert_eq!(cache.get::<Value>("/wiki/index.json"), Some(data));
}

#[test]
fn build_change_invalidates_every_key() {
    let storage = Arc::new(MemoryStorage::new());
    let (cache, _clock) = cache_with_clock(storage.clone(), 0);

    cache.set_build_timestamp(1_000);
    cache.set("a", &1);
    cache.set("b", &2);
    cache.set("c", &3);
    cache.set_build_timestamp(2_000);

    assert_eq!(cache.get::<i32>("b"), None);
    assert_eq!(cache.get::<i32>("a"), None);
    assert_eq!(cache.get::<i32>("c"), None);
    assert!(cache.keys().is_empty());
    // Only the marker remains
    assert_eq!(storage.len(), 1);
    assert_eq!(cache.current_build(), Some(2_000));
}

#[test]
fn exhausted_storage_degrades_to_no_ops() {
    let storage = Arc::new(MemoryStorage::with_quota(0));
    let (cache, _clock) = cache_with_clock(storage.clone(), 0);

    assert!(!cache.available());
    cache.set("a", &1);
    cache.remove("a");
    cache.clear();
    cache.reset();
    cache.set_build_timestamp(5);

    assert_eq!(cache.get::<i32>("a"), None);
    assert!(!cache.is_valid("a"));
    assert_eq!(cache.current_build(), None);
    assert!(cache.keys().is_empty());
    assert!(storage.is_empty());
}

#[test]
fn unwritable_storage_never_serves_reads() {
    let raw = json!({"data": {"a": 1}, "timestamp": 0}).to_string();
    let storage = Arc::new(ReadOnlyStorage::with_entry("fogsift_/meta.json", &raw));
    let (cache, _clock) = cache_with_clock(storage, 0);

    assert!(!cache.available());
    assert_eq!(cache.get::<Value>("/meta.json"), None);
    cache.set("/meta.json", &json!({"a": 2}));
    cache.remove("/meta.json");
    cache.clear();
}

#[test]
fn rejected_write_evicts_oldest_half() {
    let storage = Arc::new(MemoryStorage::with_quota(4096));
    let (cache, clock) = cache_with_clock(storage.clone(), 0);

    for i in 0..7 {
        clock.set(100 - i * 10);
        cache.set(&format!("k{}", i), &i);
    }
    cache.set_build_timestamp(1);

    clock.set(200);
    cache.set("too_big", &"x".repeat(8192));

    // k6 (t=40), k5, k4, k3 are the oldest four; k0..k2 survive
    assert_eq!(cache.keys(), vec!["k0", "k1", "k2"]);
    assert_eq!(cache.current_build(), Some(1));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // After a rejected write, ceil(n/2) of the oldest entries are gone and
    // the newest floor(n/2) remain.
    #[test]
    fn prop_cleanup_keeps_newest_half(
        timestamps in prop::collection::btree_set(0i64..1_000_000, 1..30)
    ) {
        let storage = Arc::new(MemoryStorage::with_quota(16 * 1024));
        let (cache, clock) = cache_with_clock(storage.clone(), 0);

        // Distinct timestamps, inserted in shuffled-ish order
        let ordered: Vec<i64> = timestamps.into_iter().collect();
        let mut insert_order = ordered.clone();
        insert_order.reverse();
        for ts in &insert_order {
            clock.set(*ts);
            cache.set(&format!("entry{}", ts), ts);
        }
        prop_assert_eq!(cache.keys().len(), ordered.len());

        cache.set("overflow", &"x".repeat(32 * 1024));

        let n = ordered.len();
        let mut expected: Vec<String> = ordered[n.div_ceil(2)..]
            .iter()
            .map(|ts| format!("entry{}", ts))
            .collect();
        expected.sort();
        prop_assert_eq!(cache.keys(), expected);
    }
}
