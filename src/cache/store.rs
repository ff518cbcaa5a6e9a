//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU ordering and sliding TTL
//! expiration. Not synchronized; [`ContentCache`](crate::cache::ContentCache)
//! wraps it in a mutex.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::cache::{CacheConfig, CacheEntry, CacheStats, LruIndex, StoredValue};

// == Cache Store ==
/// Main cache storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Eviction order
    lru: LruIndex,
    /// Performance statistics
    stats: CacheStats,
    /// Running sum of entry footprints
    memory_bytes: usize,
    /// Logical clock for access ordering
    touch_clock: u64,
    config: CacheConfig,
}

impl CacheStore {
    // == Constructor ==
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruIndex::new(),
            stats: CacheStats::new(),
            memory_bytes: 0,
            touch_clock: 0,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Set ==
    /// Stores a value under `key`, using the default TTL when `ttl` is `None`.
    ///
    /// Expired entries are purged first. If the key is new and the cache is at
    /// capacity, exactly one entry is evicted. Overwriting keeps the key's hit
    /// count and refreshes its access time.
    pub fn set(&mut self, key: String, value: String, ttl: Option<Duration>) {
        self.set_at(key, value, ttl, Instant::now());
    }

    pub(crate) fn set_at(&mut self, key: String, value: String, ttl: Option<Duration>, now: Instant) {
        if self.config.max_entries == 0 {
            debug!("Cache disabled (max_entries = 0), dropping key '{}'", key);
            return;
        }

        self.purge_expired_at(now);

        let previous_hits = match self.detach(&key) {
            Some(old) => old.hit_count,
            None => {
                if self.entries.len() >= self.config.max_entries {
                    self.evict_one();
                }
                0
            }
        };

        let stored = StoredValue::encode(value, self.config.compression_threshold);
        let seq = self.next_touch();
        let mut entry = CacheEntry::new(stored, ttl.unwrap_or(self.config.ttl), now, seq);
        entry.hit_count = previous_hits;

        self.attach(key, entry);
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns `None` for absent keys, for entries idle longer than their TTL
    /// (which are purged), and for payloads that fail to decompress.
    pub fn get(&mut self, key: &str) -> Option<String> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&mut self, key: &str, now: Instant) -> Option<String> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            self.detach(key);
            self.stats.record_expirations(1);
            self.stats.record_miss();
            return None;
        }

        let seq = self.next_touch();
        let decoded = match self.entries.get_mut(key) {
            Some(entry) => {
                let old_rank = entry.rank();
                entry.record_hit(now, seq);
                self.lru.reposition(old_rank, entry.rank());
                entry.value.decode()
            }
            None => None,
        };

        match decoded {
            Some(value) => {
                self.stats.record_hit();
                Some(value)
            }
            None => {
                // Corrupt payload: drop it rather than serve it again
                self.detach(key);
                self.stats.record_miss();
                None
            }
        }
    }

    // == Contains ==
    /// Checks for a live entry without touching it or the statistics.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired_at(Instant::now()))
            .unwrap_or(false)
    }

    // == Clear ==
    /// Removes every entry. Returns the number removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.memory_bytes = 0;
        self.stats.record_evictions(removed);
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.size = self.entries.len();
        stats.memory_bytes = self.memory_bytes;
        stats.compressed_entries = self
            .entries
            .values()
            .filter(|entry| entry.value.is_compressed())
            .count();
        stats
    }

    // == Purge Expired ==
    /// Removes all expired entries. Returns the number removed.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub(crate) fn purge_expired_at(&mut self, now: Instant) -> usize {
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired_keys {
            self.detach(key);
        }

        self.stats.record_expirations(expired_keys.len());
        expired_keys.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internals ==
    fn next_touch(&mut self) -> u64 {
        self.touch_clock += 1;
        self.touch_clock
    }

    fn evict_one(&mut self) {
        if let Some(victim) = self.lru.pop_victim() {
            if let Some(entry) = self.entries.remove(&victim) {
                self.memory_bytes -= entry.footprint(&victim);
            }
            self.stats.record_evictions(1);
            debug!("Evicted least recently used key '{}'", victim);
        }
        debug_assert_eq!(self.entries.len(), self.lru.len());
    }

    fn attach(&mut self, key: String, entry: CacheEntry) {
        self.memory_bytes += entry.footprint(&key);
        self.lru.insert(entry.rank(), &key);
        self.entries.insert(key, entry);
        debug_assert_eq!(self.entries.len(), self.lru.len());
    }

    fn detach(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(&entry.rank());
        self.memory_bytes -= entry.footprint(key);
        debug_assert_eq!(self.entries.len(), self.lru.len());
        Some(entry)
    }
}
