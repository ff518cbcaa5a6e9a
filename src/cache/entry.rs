//! Cache Entry Module
//!
//! Defines a single cache entry: its payload, sliding TTL and access metadata.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::cache::compression::{compress, decompress};
use crate::cache::lru::EvictionRank;

// == Stored Value ==
/// Payload as held in the map, verbatim or gzip-compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Plain(String),
    Compressed(Vec<u8>),
}

impl StoredValue {
    /// Encodes a value, compressing it when it is longer than `threshold` chars.
    ///
    /// A compression failure keeps the value uncompressed.
    pub fn encode(value: String, threshold: usize) -> Self {
        if value.chars().count() <= threshold {
            return StoredValue::Plain(value);
        }

        match compress(&value) {
            Ok(bytes) => StoredValue::Compressed(bytes),
            Err(err) => {
                warn!("Compression failed, storing value uncompressed: {}", err);
                StoredValue::Plain(value)
            }
        }
    }

    /// Returns the original value, or `None` if compressed data is corrupt.
    pub fn decode(&self) -> Option<String> {
        match self {
            StoredValue::Plain(text) => Some(text.clone()),
            StoredValue::Compressed(bytes) => match decompress(bytes) {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!("Failed to decompress cached value: {}", err);
                    None
                }
            },
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, StoredValue::Compressed(_))
    }

    /// Bytes held by the payload itself.
    pub fn stored_bytes(&self) -> usize {
        match self {
            StoredValue::Plain(text) => text.len(),
            StoredValue::Compressed(bytes) => bytes.len(),
        }
    }
}

// == Cache Entry ==
/// A single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value
    pub value: StoredValue,
    /// When the value was written
    pub created_at: Instant,
    /// Last read or write; the TTL slides from here
    pub last_access_at: Instant,
    /// Number of successful reads
    pub hit_count: u64,
    /// Time to live measured from `last_access_at`
    pub ttl: Duration,
    /// Logical access clock, the final eviction tie-break
    pub(crate) touch_seq: u64,
}

impl CacheEntry {
    // == Constructor ==
    pub fn new(value: StoredValue, ttl: Duration, now: Instant, touch_seq: u64) -> Self {
        Self {
            value,
            created_at: now,
            last_access_at: now,
            hit_count: 0,
            ttl,
            touch_seq,
        }
    }

    // == Is Expired ==
    /// Checks whether the entry has outlived its TTL at `now`.
    ///
    /// An entry whose idle time equals the TTL is still live; it expires once
    /// the idle time is strictly greater.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_access_at) > self.ttl
    }

    // == Record Hit ==
    /// Refreshes the access time and bumps the hit counter.
    pub fn record_hit(&mut self, now: Instant, touch_seq: u64) {
        self.last_access_at = now;
        self.hit_count += 1;
        self.touch_seq = touch_seq;
    }

    /// Position of this entry in the eviction order.
    pub fn rank(&self) -> EvictionRank {
        EvictionRank {
            last_access_at: self.last_access_at,
            hit_count: self.hit_count,
            touch_seq: self.touch_seq,
        }
    }

    /// Approximate heap footprint of the entry for `key`.
    pub fn footprint(&self, key: &str) -> usize {
        key.len() + self.value.stored_bytes() + std::mem::size_of::<Self>()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_value_stays_plain() {
        let value = StoredValue::encode("short".to_string(), 1000);
        assert!(!value.is_compressed());
        assert_eq!(value.decode().as_deref(), Some("short"));
    }

    #[test]
    fn test_long_value_is_compressed() {
        let text = "x".repeat(1001);
        let value = StoredValue::encode(text.clone(), 1000);
        assert!(value.is_compressed());
        assert!(value.stored_bytes() < text.len());
        assert_eq!(value.decode(), Some(text));
    }

    #[test]
    fn test_threshold_counts_chars_not_bytes() {
        // 1000 two-byte chars is exactly at the threshold
        let text = "é".repeat(1000);
        assert!(!StoredValue::encode(text, 1000).is_compressed());
    }

    #[test]
    fn test_corrupt_payload_decodes_to_none() {
        let value = StoredValue::Compressed(vec![1, 2, 3]);
        assert!(value.decode().is_none());
    }

    #[test]
    fn test_expiration_boundary() {
        let now = Instant::now();
        let entry = CacheEntry::new(StoredValue::Plain("v".into()), Duration::from_secs(1), now, 0);

        assert!(!entry.is_expired_at(now));
        assert!(!entry.is_expired_at(now + Duration::from_secs(1)));
        assert!(entry.is_expired_at(now + Duration::from_millis(1001)));
    }

    #[test]
    fn test_hit_slides_ttl() {
        let start = Instant::now();
        let mut entry =
            CacheEntry::new(StoredValue::Plain("v".into()), Duration::from_secs(1), start, 0);

        let later = start + Duration::from_millis(900);
        entry.record_hit(later, 1);

        assert_eq!(entry.hit_count, 1);
        assert!(!entry.is_expired_at(start + Duration::from_millis(1500)));
        assert!(entry.is_expired_at(later + Duration::from_millis(1001)));
    }
}
