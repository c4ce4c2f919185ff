//! Cache module for storing API responses
//!
//! This module provides a cache manager that persists API responses in a
//! namespaced key-value slot with a TTL and build-marker invalidation. The
//! slot is pluggable (`Storage`): a directory of files for real runs, or
//! memory for tests. When the slot misbehaves the cache quietly turns into
//! a series of misses so callers fall through to the network.

mod clock;
mod manager;
mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{CacheManager, DEFAULT_PREFIX, DEFAULT_TTL_MS};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
