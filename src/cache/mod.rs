//! Cache Module
//!
//! In-memory content cache with sliding TTL expiration, LRU eviction and
//! transparent compression of large values.

mod compression;
mod content_cache;
mod entry;
mod lru;
mod stats;
mod store;


use std::time::Duration;

// Re-export public types
pub use content_cache::ContentCache;
pub use entry::{CacheEntry, StoredValue};
pub use lru::{EvictionRank, LruIndex};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Cache Config ==
/// Capacity, default TTL and compression threshold of a cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// TTL applied when `set` gets none
    pub ttl: Duration,
    /// Values longer than this many chars are compressed
    pub compression_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl: Duration::from_secs(300),
            compression_threshold: 1000,
        }
    }
}
