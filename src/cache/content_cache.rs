//! Content Cache
//!
//! Thread-safe handle over [`CacheStore`]. Every operation, reads included,
//! runs under one exclusive lock.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::cache::{CacheConfig, CacheStats, CacheStore};

/// Shared TTL+LRU cache for memoized lookups such as auxiliary document context.
#[derive(Debug)]
pub struct ContentCache {
    inner: Mutex<CacheStore>,
}

impl ContentCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheStore::new(config)),
        }
    }

    /// Returns the cached value, or `None` on a miss.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().get(key)
    }

    /// Stores `value` with the default TTL.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.lock().set(key.into(), value.into(), None);
    }

    /// Stores `value` with an explicit TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        self.inner.lock().set(key.into(), value.into(), Some(ttl));
    }

    /// Pre-populates the cache through the normal `set` path.
    pub fn warm<I, K, V>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut store = self.inner.lock();
        let mut count = 0;
        for (key, value) in items {
            store.set(key.into(), value.into(), None);
            count += 1;
        }
        info!("Warmed content cache with {} entries", count);
        count
    }

    /// Drops every entry. Returns the number removed.
    pub fn clear(&self) -> usize {
        self.inner.lock().clear()
    }

    /// Drops expired entries. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.lock().purge_expired()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
