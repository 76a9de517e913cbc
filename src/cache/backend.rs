//! Cache backend contract shared by the memory and distributed implementations.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cache::TtlPolicy;

/// Which backend a cache handle is talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheImplementation {
    Redis,
    Memory,
}

impl CacheImplementation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheImplementation::Redis => "redis",
            CacheImplementation::Memory => "memory",
        }
    }
}

impl fmt::Display for CacheImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheImplementation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" | "distributed" => Ok(CacheImplementation::Redis),
            "memory" | "in-memory" => Ok(CacheImplementation::Memory),
            other => Err(format!("unknown cache implementation '{}'", other)),
        }
    }
}

/// A backend failure that was absorbed and converted into a safe default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoftFailure {
    pub operation: &'static str,
    pub key: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Bounded log of recent soft failures, oldest dropped first.
#[derive(Debug)]
pub struct SoftFailureLog {
    entries: Mutex<VecDeque<SoftFailure>>,
    capacity: usize,
}

impl SoftFailureLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, failure: SoftFailure) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(failure);
    }

    /// Recent failures, oldest first.
    pub fn snapshot(&self) -> Vec<SoftFailure> {
        self.entries.lock().iter().cloned().collect()
    }
}

/// Uniform capability contract for cache backends.
///
/// Values are JSON strings; typed access lives on [`crate::cache::Cache`].
/// Implementations never return errors: failures are logged and mapped to
/// the documented safe default of each operation.
#[async_trait]
pub trait CacheBackend: Send + Sync + fmt::Debug {
    /// Returns the stored payload, `None` when absent, expired or unreachable.
    async fn get_raw(&self, key: &str) -> Option<String>;

    /// Stores a payload. `None` uses the `medium` tier.
    async fn set_raw(&self, key: &str, value: String, ttl_seconds: Option<u64>);

    /// Removes a key, returning whether it existed.
    async fn del(&self, key: &str) -> bool;

    /// Removes every key matching `pattern`, returning the count removed.
    async fn clear_pattern(&self, pattern: &str) -> u64;

    async fn exists(&self, key: &str) -> bool;

    /// Removes everything. Dangerous on a shared distributed store.
    async fn clear(&self);

    /// Remaining TTL in seconds; `-2` for a missing key, `-1` on error or no expiry.
    async fn get_ttl(&self, key: &str) -> i64;

    /// Resets the TTL of an existing key.
    async fn update_ttl(&self, key: &str, ttl_seconds: u64) -> bool;

    async fn health_check(&self) -> bool;

    fn implementation(&self) -> CacheImplementation;

    fn ttl_policy(&self) -> &TtlPolicy;

    /// Failures absorbed by this backend, oldest first.
    fn soft_failures(&self) -> Vec<SoftFailure> {
        Vec::new()
    }
}
