//! Cache Entry Module
//!
//! Defines the structure for individual memory cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A single memory cache entry holding a serialized value and its expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The serialized value
    pub value: String,
    /// Creation instant
    pub created_at: Instant,
    /// Expiration instant
    pub expires_at: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl_seconds` from now.
    pub fn new(value: String, ttl_seconds: u64) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            expires_at: expiry_after(now, ttl_seconds),
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is still live at exactly its expiry instant and expired
    /// strictly after it.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns remaining TTL in whole seconds, 0 once expired.
    pub fn ttl_remaining(&self) -> u64 {
        self.expires_at
            .saturating_duration_since(Instant::now())
            .as_secs()
    }

    /// Moves the expiry to `ttl_seconds` from now.
    pub fn refresh_ttl(&mut self, ttl_seconds: u64) {
        self.expires_at = expiry_after(Instant::now(), ttl_seconds);
    }
}

/// Longest expiry an entry can carry; larger TTLs saturate here.
const MAX_EXPIRY: Duration = Duration::from_secs(100 * 365 * 86_400);

fn expiry_after(now: Instant, ttl_seconds: u64) -> Instant {
    let ttl = Duration::from_secs(ttl_seconds).min(MAX_EXPIRY);
    now.checked_add(ttl).unwrap_or(now)
}
