//! Cache Statistics Module
//!
//! Tracks memory cache counters including hits, misses, sets and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Memory cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// Number of stores
    pub sets: u64,
    /// Number of expired entries removed on read or by a sweep
    pub evictions: u64,
    /// Current number of entries in the cache
    pub keys: usize,
    /// Hit ratio as a percentage, recomputed on demand
    pub hit_ratio: f64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Ratio ==
    /// Returns hits / (hits + misses) * 100, or 0.0 if no reads have been made.
    pub fn compute_hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_evictions(&mut self, count: u64) {
        self.evictions += count;
    }

    /// Returns a copy with `keys` and `hit_ratio` filled in.
    pub fn snapshot(&self, keys: usize) -> Self {
        Self {
            keys,
            hit_ratio: self.compute_hit_ratio(),
            ..self.clone()
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.keys, 0);
    }

    #[test]
    fn test_hit_ratio_no_requests() {
        assert_eq!(CacheStats::new().compute_hit_ratio(), 0.0);
    }

    #[test]
    fn test_hit_ratio_is_percentage() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.compute_hit_ratio(), 75.0);
    }

    #[test]
    fn test_snapshot_fills_derived_fields() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_set();
        stats.record_evictions(2);

        let snapshot = stats.snapshot(7);
        assert_eq!(snapshot.keys, 7);
        assert_eq!(snapshot.hit_ratio, 50.0);
        assert_eq!(snapshot.sets, 1);
        assert_eq!(snapshot.evictions, 2);
    }
}
