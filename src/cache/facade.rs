//! Cache Facade
//!
//! Typed access to whichever backend the factory selected, plus
//! dependency-tracked invalidation and warmup.

use std::fmt;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use tracing::{debug, error, warn};

use crate::cache::{CacheBackend, CacheImplementation, DependencyTracker, SoftFailure};

/// Fetch function used to fill a cache entry during warmup.
pub type WarmupFetch =
    Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<serde_json::Value>> + Send>;

/// One entry to preload.
pub struct WarmupItem {
    pub key: String,
    pub ttl: Option<u64>,
    pub fetch: WarmupFetch,
}

impl WarmupItem {
    pub fn new<F, Fut>(key: impl Into<String>, ttl: Option<u64>, fetch: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            key: key.into(),
            ttl,
            fetch: Box::new(move || Box::pin(fetch())),
        }
    }
}

impl fmt::Debug for WarmupItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarmupItem")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Result of warming a single key.
#[derive(Debug, Clone, PartialEq)]
pub enum WarmupOutcome {
    /// Key was already cached; fetch not invoked
    Skipped,
    /// Fetched and stored
    Loaded,
    /// Fetch failed; other items are unaffected
    Failed(String),
}

impl Serialize for WarmupOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WarmupOutcome::Skipped => serializer.serialize_str("skipped"),
            WarmupOutcome::Loaded => serializer.serialize_str("loaded"),
            WarmupOutcome::Failed(msg) => serializer.serialize_str(&format!("failed: {}", msg)),
        }
    }
}

/// What an [`Cache::invalidate`] call removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvalidationReport {
    /// Whether the key itself was present
    pub key_removed: bool,
    /// Dependents that were registered and deleted
    pub dependents_removed: Vec<String>,
    /// Dependents that were registered but already absent
    pub dependents_missing: Vec<String>,
}

// == Cache ==
/// Uniform cache interface handed to callers.
///
/// Cloning is cheap; clones share the backend and the dependency map.
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    dependencies: Arc<DependencyTracker>,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("backend", &self.backend)
            .field("dependencies", &self.dependencies.len())
            .finish()
    }
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>, dependencies: Arc<DependencyTracker>) -> Self {
        Self {
            backend,
            dependencies,
        }
    }

    pub fn implementation(&self) -> CacheImplementation {
        self.backend.implementation()
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Reads and deserializes a value. Absent, expired, unreachable or
    /// undecodable entries all read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.get_raw(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "Cache HIT");
                Some(value)
            }
            Err(e) => {
                error!(key, error = %e, "Failed to deserialize cached value");
                None
            }
        }
    }

    /// Serializes and stores a value. `None` TTL uses the `medium` tier.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<u64>) {
        match serde_json::to_string(value) {
            Ok(raw) => self.backend.set_raw(key, raw, ttl).await,
            Err(e) => error!(key, error = %e, "Failed to serialize value for cache"),
        }
    }

    pub async fn del(&self, key: &str) -> bool {
        self.backend.del(key).await
    }

    pub async fn clear_pattern(&self, pattern: &str) -> u64 {
        self.backend.clear_pattern(pattern).await
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.backend.exists(key).await
    }

    /// Clears the backend and forgets every dependency edge.
    pub async fn clear(&self) {
        self.backend.clear().await;
        self.dependencies.clear();
    }

    pub async fn get_ttl(&self, key: &str) -> i64 {
        self.backend.get_ttl(key).await
    }

    pub async fn update_ttl(&self, key: &str, ttl_seconds: u64) -> bool {
        self.backend.update_ttl(key, ttl_seconds).await
    }

    /// Second count for a TTL tier name; unknown names resolve to `medium`.
    pub fn ttl_value(&self, tier: &str) -> u64 {
        self.backend.ttl_policy().ttl_value(Some(tier))
    }

    pub fn soft_failures(&self) -> Vec<SoftFailure> {
        self.backend.soft_failures()
    }

    // == Dependencies ==
    /// Stores `value` and registers `key` as dependent on each dependency key.
    pub async fn set_with_dependencies<T, S>(
        &self,
        key: &str,
        value: &T,
        dependencies: &[S],
        ttl: Option<u64>,
    ) where
        T: Serialize + ?Sized,
        S: AsRef<str>,
    {
        self.set(key, value, ttl).await;
        self.dependencies.register(key, dependencies);
    }

    /// Deletes `key` and every key registered as dependent on it, then drops
    /// the registration.
    ///
    /// The cascade is one level deep. Edges are taken before any delete, so a
    /// failed delete leaves that dependent cached but unregistered.
    pub async fn invalidate(&self, key: &str) -> InvalidationReport {
        let dependents = self.dependencies.take_dependents(key);
        let mut report = InvalidationReport {
            key_removed: self.backend.del(key).await,
            ..Default::default()
        };

        for dependent in dependents {
            if self.backend.del(&dependent).await {
                report.dependents_removed.push(dependent);
            } else {
                report.dependents_missing.push(dependent);
            }
        }

        debug!(
            key,
            removed = report.dependents_removed.len(),
            missing = report.dependents_missing.len(),
            "Cache invalidated"
        );
        report
    }

    // == Warmup ==
    /// Loads every missing item concurrently.
    ///
    /// Items already present are skipped without fetching. A failing fetch
    /// only affects its own item. Outcomes are returned in input order.
    pub async fn warmup(&self, items: Vec<WarmupItem>) -> Vec<WarmupOutcome> {
        let tasks = items.into_iter().map(|item| async move {
            if self.backend.exists(&item.key).await {
                return WarmupOutcome::Skipped;
            }
            match (item.fetch)().await {
                Ok(value) => {
                    self.set(&item.key, &value, item.ttl).await;
                    WarmupOutcome::Loaded
                }
                Err(e) => {
                    warn!(key = %item.key, error = %e, "Cache warmup fetch failed");
                    WarmupOutcome::Failed(e.to_string())
                }
            }
        });
        join_all(tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, TtlPolicy};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct StudyOffer {
        id: u32,
        title: String,
    }

    fn memory_cache() -> Cache {
        Cache::new(
            Arc::new(MemoryCache::new(TtlPolicy::default())),
            Arc::new(DependencyTracker::new()),
        )
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let cache = memory_cache();
        let offer = StudyOffer {
            id: 123,
            title: "Semester in Lyon".to_string(),
        };

        cache.set("study_offer:123", &offer, Some(3600)).await;
        assert_eq!(cache.get::<StudyOffer>("study_offer:123").await, Some(offer));
        assert_eq!(cache.get::<StudyOffer>("study_offer:999").await, None);
    }

    #[tokio::test]
    async fn test_undecodable_value_reads_as_none() {
        let cache = memory_cache();
        cache.set("n", &42, None).await;
        assert_eq!(cache.get::<StudyOffer>("n").await, None);
    }

    #[tokio::test]
    async fn test_invalidate_cascades_one_level() {
        let cache = memory_cache();
        cache.set("study_offer:1", &"offer", None).await;
        cache
            .set_with_dependencies("study_offer:list:p1", &"list", &["study_offer:1"], None)
            .await;
        cache
            .set_with_dependencies("study_offer:list:p2", &"list", &["study_offer:1"], None)
            .await;
        cache
            .set_with_dependencies("home:featured", &"home", &["study_offer:list:p1"], None)
            .await;
        cache.set("user:1", &"user", None).await;

        let report = cache.invalidate("study_offer:1").await;
        assert!(report.key_removed);
        assert_eq!(
            report.dependents_removed,
            vec![
                "study_offer:list:p1".to_string(),
                "study_offer:list:p2".to_string()
            ]
        );

        assert!(!cache.exists("study_offer:list:p1").await);
        assert!(!cache.exists("study_offer:list:p2").await);
        // not transitive
        assert!(cache.exists("home:featured").await);
        assert!(cache.exists("user:1").await);

        let again = cache.invalidate("study_offer:1").await;
        assert!(!again.key_removed);
        assert!(again.dependents_removed.is_empty());
        assert!(again.dependents_missing.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_reports_already_missing_dependents() {
        let cache = memory_cache();
        cache
            .set_with_dependencies("list", &"l", &["offer"], None)
            .await;
        cache.del("list").await;

        let report = cache.invalidate("offer").await;
        assert!(!report.key_removed);
        assert_eq!(report.dependents_missing, vec!["list".to_string()]);
    }

    #[tokio::test]
    async fn test_warmup_skips_present_and_isolates_failures() {
        let cache = memory_cache();
        cache.set("present", &1, None).await;
        let fetches = Arc::new(AtomicU32::new(0));

        let counter = fetches.clone();
        let present = WarmupItem::new("present", None, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!(2))
        });
        let counter = fetches.clone();
        let broken = WarmupItem::new("broken", None, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("database down"))
        });
        let counter = fetches.clone();
        let fresh = WarmupItem::new("fresh", Some(60), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!({"id": 3}))
        });

        let outcomes = cache.warmup(vec![present, broken, fresh]).await;
        assert_eq!(
            outcomes,
            vec![
                WarmupOutcome::Skipped,
                WarmupOutcome::Failed("database down".to_string()),
                WarmupOutcome::Loaded,
            ]
        );
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get::<i32>("present").await, Some(1));
        assert_eq!(
            cache.get::<serde_json::Value>("fresh").await,
            Some(serde_json::json!({"id": 3}))
        );
    }

    #[tokio::test]
    async fn test_ttl_value_and_clear() {
        let cache = memory_cache();
        assert_eq!(cache.ttl_value("short"), 300);
        assert_eq!(cache.ttl_value("unknown"), 1800);

        cache.set_with_dependencies("a", &1, &["b"], None).await;
        cache.clear().await;
        assert!(!cache.exists("a").await);
        assert!(cache.invalidate("b").await.dependents_missing.is_empty());
    }
}
