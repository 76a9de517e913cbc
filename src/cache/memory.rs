//! Memory Cache Backend
//!
//! [`CacheBackend`] over a shared [`MemoryStore`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{CacheBackend, CacheImplementation, CacheStats, MemoryStore, TtlPolicy};

/// Process-local cache backend.
///
/// Clones share the same store, so the sweep task and the factory observe
/// the same entries.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    store: Arc<RwLock<MemoryStore>>,
    ttl: TtlPolicy,
}

impl MemoryCache {
    pub fn new(ttl: TtlPolicy) -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new())),
            ttl,
        }
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> Arc<RwLock<MemoryStore>> {
        self.store.clone()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    /// Removes every key with the literal `prefix`.
    pub async fn delete_by_prefix(&self, prefix: &str) -> usize {
        self.store.write().await.delete_by_prefix(prefix)
    }

    pub async fn sweep_expired(&self) -> usize {
        self.store.write().await.sweep_expired()
    }
}

/// Literal prefix of a glob pattern: everything before the first `*`.
/// A pattern starting with `*` yields the empty prefix and matches every key.
fn glob_prefix(pattern: &str) -> &str {
    match pattern.find('*') {
        Some(idx) => &pattern[..idx],
        None => pattern,
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get_raw(&self, key: &str) -> Option<String> {
        self.store.write().await.get(key)
    }

    async fn set_raw(&self, key: &str, value: String, ttl_seconds: Option<u64>) {
        let ttl = ttl_seconds.unwrap_or(self.ttl.medium);
        self.store.write().await.set(key, value, ttl);
    }

    async fn del(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    async fn clear_pattern(&self, pattern: &str) -> u64 {
        self.delete_by_prefix(glob_prefix(pattern)).await as u64
    }

    async fn exists(&self, key: &str) -> bool {
        self.store.write().await.contains(key)
    }

    async fn clear(&self) {
        self.store.write().await.clear();
    }

    async fn get_ttl(&self, key: &str) -> i64 {
        match self.store.write().await.ttl_remaining(key) {
            Some(secs) => secs as i64,
            None => -2,
        }
    }

    async fn update_ttl(&self, key: &str, ttl_seconds: u64) -> bool {
        self.store.write().await.update_ttl(key, ttl_seconds)
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn implementation(&self) -> CacheImplementation {
        CacheImplementation::Memory
    }

    fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }
}
