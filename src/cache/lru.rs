//! LRU Index Module
//!
//! Orders cache keys for eviction.

use std::collections::BTreeMap;
use std::time::Instant;

// == Eviction Rank ==
/// Sort key for eviction: least recently used first, then fewest hits,
/// then oldest logical touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EvictionRank {
    pub last_access_at: Instant,
    pub hit_count: u64,
    pub touch_seq: u64,
}

// == LRU Index ==
/// Ordered index from eviction rank to key.
///
/// - First = next eviction victim
/// - Last = most recently used
#[derive(Debug, Default)]
pub struct LruIndex {
    order: BTreeMap<EvictionRank, String>,
}

impl LruIndex {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
        }
    }

    // == Insert ==
    /// Tracks `key` at `rank`.
    pub fn insert(&mut self, rank: EvictionRank, key: &str) {
        self.order.insert(rank, key.to_string());
    }

    // == Reposition ==
    /// Moves a key from its previous rank to a new one.
    pub fn reposition(&mut self, old: EvictionRank, new: EvictionRank) {
        if let Some(key) = self.order.remove(&old) {
            self.order.insert(new, key);
        }
    }

    // == Remove ==
    /// Stops tracking the key held at `rank`.
    pub fn remove(&mut self, rank: &EvictionRank) -> Option<String> {
        self.order.remove(rank)
    }

    // == Pop Victim ==
    /// Returns and removes the next key to evict.
    pub fn pop_victim(&mut self) -> Option<String> {
        self.order.pop_first().map(|(_, key)| key)
    }

    // == Peek Victim ==
    #[allow(dead_code)]
    pub fn peek_victim(&self) -> Option<&String> {
        self.order.first_key_value().map(|(_, key)| key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}
