//! Memory Store Module
//!
//! Synchronous in-process key/value storage with per-entry expiry.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::cache::{CacheEntry, CacheStats};

// == Memory Store ==
/// In-process cache storage with TTL expiration and hit/miss statistics.
///
/// Every operation is synchronous and total: nothing here can fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Performance statistics
    stats: CacheStats,
}

impl MemoryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Stores a value expiring `ttl_seconds` from now, overwriting any existing entry.
    pub fn set(&mut self, key: impl Into<String>, value: String, ttl_seconds: u64) {
        self.entries
            .insert(key.into(), CacheEntry::new(value, ttl_seconds));
        self.stats.record_set();
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// An expired entry is removed and counted as both a miss and an eviction.
    pub fn get(&mut self, key: &str) -> Option<String> {
        match self.live_entry(key) {
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Contains ==
    /// Checks for a live entry without touching hit/miss counters.
    pub fn contains(&mut self, key: &str) -> bool {
        self.live_entry(key).is_some()
    }

    // == Delete ==
    /// Removes an entry, returning whether one was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    // == Delete By Prefix ==
    /// Removes every key starting with the literal `prefix`.
    ///
    /// Returns the number of entries removed.
    pub fn delete_by_prefix(&mut self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before - self.entries.len()
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // == TTL ==
    /// Remaining whole seconds for a live key, `None` when absent or expired.
    pub fn ttl_remaining(&mut self, key: &str) -> Option<u64> {
        self.live_entry(key).map(CacheEntry::ttl_remaining)
    }

    /// Resets the expiry of a live key. Returns false when the key is absent.
    pub fn update_ttl(&mut self, key: &str, ttl_seconds: u64) -> bool {
        if !self.contains(key) {
            return false;
        }
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.refresh_ttl(ttl_seconds);
                true
            }
            None => false,
        }
    }

    // == Sweep Expired ==
    /// Removes all expired entries, returning how many were removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - self.entries.len();
        self.stats.record_evictions(removed as u64);
        removed
    }

    // == Stats ==
    /// Returns current statistics with the hit ratio recomputed.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `key` if live, evicting it first if it has expired.
    fn live_entry(&mut self, key: &str) -> Option<&CacheEntry> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.entries.remove(key);
            self.stats.record_evictions(1);
            return None;
        }
        self.entries.get(key)
    }
}
