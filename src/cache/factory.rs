//! Cache Factory
//!
//! Selects the cache backend once, memoizes the choice, and degrades to the
//! memory backend when the distributed one is unavailable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::cache::{
    Cache, CacheBackend, CacheImplementation, DependencyTracker, KeyValueStore, MemoryCache,
    RedisCache, RedisStore, TtlPolicy,
};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::monitoring::MonitoringService;

/// Backend selection settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub implementation: CacheImplementation,
    pub fallback_to_memory: bool,
    pub redis_url: String,
    pub ttl: TtlPolicy,
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            implementation: config.cache_implementation,
            fallback_to_memory: config.cache_fallback,
            redis_url: config.redis_url.clone(),
            ttl: config.ttl,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Composition-root owner of the cache backend choice.
pub struct CacheFactory {
    settings: CacheSettings,
    implementation: RwLock<CacheImplementation>,
    instance: RwLock<Option<Cache>>,
    memory: MemoryCache,
    remote_store: Arc<dyn KeyValueStore>,
    dependencies: Arc<DependencyTracker>,
    monitoring: Option<Arc<MonitoringService>>,
    downgrade_logged: AtomicBool,
}

impl std::fmt::Debug for CacheFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheFactory")
            .field("settings", &self.settings)
            .field("memory", &self.memory)
            .finish()
    }
}

impl CacheFactory {
    /// Creates a factory whose distributed backend talks to `settings.redis_url`.
    pub fn new(settings: CacheSettings, monitoring: Option<Arc<MonitoringService>>) -> Self {
        let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::new(settings.redis_url.clone()));
        Self::with_remote_store(settings, store, monitoring)
    }

    /// Creates a factory with an explicit distributed store client.
    pub fn with_remote_store(
        settings: CacheSettings,
        remote_store: Arc<dyn KeyValueStore>,
        monitoring: Option<Arc<MonitoringService>>,
    ) -> Self {
        Self {
            implementation: RwLock::new(settings.implementation),
            instance: RwLock::new(None),
            memory: MemoryCache::new(settings.ttl),
            remote_store,
            dependencies: Arc::new(DependencyTracker::new()),
            monitoring,
            downgrade_logged: AtomicBool::new(false),
            settings,
        }
    }

    /// The process-local backend, also used as the fallback.
    pub fn memory_cache(&self) -> &MemoryCache {
        &self.memory
    }

    /// Returns the memoized cache, resolving the backend on first use.
    pub async fn get_cache(&self) -> CacheResult<Cache> {
        if let Some(cache) = self.instance.read().await.as_ref() {
            return Ok(cache.clone());
        }

        let mut instance = self.instance.write().await;
        if let Some(cache) = instance.as_ref() {
            return Ok(cache.clone());
        }

        let implementation = *self.implementation.read().await;
        let backend = self.resolve(implementation).await?;
        let cache = Cache::new(backend, self.dependencies.clone());
        *instance = Some(cache.clone());
        Ok(cache)
    }

    /// Switches the preferred backend. The next `get_cache` re-resolves.
    pub async fn set_implementation(&self, implementation: CacheImplementation) {
        *self.implementation.write().await = implementation;
        *self.instance.write().await = None;
        self.dependencies.clear();
        self.downgrade_logged.store(false, Ordering::Relaxed);
        info!(implementation = %implementation, "Cache implementation changed");
    }

    pub async fn implementation(&self) -> CacheImplementation {
        *self.implementation.read().await
    }

    /// Backend of the memoized instance, if one has been resolved.
    pub async fn active_implementation(&self) -> Option<CacheImplementation> {
        self.instance
            .read()
            .await
            .as_ref()
            .map(Cache::implementation)
    }

    async fn resolve(
        &self,
        implementation: CacheImplementation,
    ) -> CacheResult<Arc<dyn CacheBackend>> {
        match implementation {
            CacheImplementation::Memory => {
                info!(backend = "memory", "Cache backend initialized");
                Ok(Arc::new(self.memory.clone()))
            }
            CacheImplementation::Redis => {
                let redis = RedisCache::new(
                    self.remote_store.clone(),
                    self.settings.ttl,
                    self.monitoring.clone(),
                );
                if redis.health_check().await {
                    info!(backend = "redis", "Distributed cache backend initialized");
                    return Ok(Arc::new(redis));
                }

                if !self.settings.fallback_to_memory {
                    return Err(CacheError::Unavailable(
                        "distributed cache unreachable and memory fallback disabled".to_string(),
                    ));
                }

                if !self.downgrade_logged.swap(true, Ordering::Relaxed) {
                    warn!("Distributed cache unavailable, falling back to memory cache");
                }
                Ok(Arc::new(self.memory.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    /// Store that only answers PING, according to a switch.
    #[derive(Default)]
    struct PingOnlyStore {
        reachable: AtomicBool,
        pings: AtomicU32,
    }

    fn down() -> CacheError {
        CacheError::Connection("connection refused".to_string())
    }

    #[async_trait]
    impl KeyValueStore for PingOnlyStore {
        async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
            Ok(None)
        }
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: u64) -> CacheResult<()> {
            Ok(())
        }
        async fn del(&self, _keys: &[String]) -> CacheResult<u64> {
            Ok(0)
        }
        async fn scan(&self, _c: u64, _p: &str, _n: usize) -> CacheResult<(u64, Vec<String>)> {
            Ok((0, Vec::new()))
        }
        async fn exists(&self, _key: &str) -> CacheResult<bool> {
            Ok(false)
        }
        async fn ttl(&self, _key: &str) -> CacheResult<i64> {
            Ok(-2)
        }
        async fn expire(&self, _key: &str, _ttl: u64) -> CacheResult<bool> {
            Ok(false)
        }
        async fn flush_db(&self) -> CacheResult<()> {
            Ok(())
        }
        async fn ping(&self) -> CacheResult<()> {
            self.pings.fetch_add(1, Ordering::SeqCst);
            if self.reachable.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(down())
            }
        }
    }

    fn factory(store: Arc<PingOnlyStore>, fallback: bool) -> CacheFactory {
        let settings = CacheSettings {
            fallback_to_memory: fallback,
            ..CacheSettings::default()
        };
        CacheFactory::with_remote_store(settings, store, None)
    }

    #[tokio::test]
    async fn test_prefers_distributed_backend() {
        let store = Arc::new(PingOnlyStore::default());
        store.reachable.store(true, Ordering::SeqCst);
        let factory = factory(store, true);

        let cache = factory.get_cache().await.unwrap();
        assert_eq!(cache.implementation(), CacheImplementation::Redis);
    }

    #[tokio::test]
    async fn test_falls_back_to_memory_and_memoizes() {
        let store = Arc::new(PingOnlyStore::default());
        let factory = factory(store.clone(), true);

        let first = factory.get_cache().await.unwrap();
        let second = factory.get_cache().await.unwrap();

        assert_eq!(first.implementation(), CacheImplementation::Memory);
        assert_eq!(second.implementation(), CacheImplementation::Memory);
        assert_eq!(store.pings.load(Ordering::SeqCst), 1);
        assert_eq!(
            factory.active_implementation().await,
            Some(CacheImplementation::Memory)
        );
    }

    #[tokio::test]
    async fn test_unavailable_without_fallback() {
        let store = Arc::new(PingOnlyStore::default());
        let factory = factory(store, false);

        let result = factory.get_cache().await;
        assert!(matches!(result, Err(CacheError::Unavailable(_))));
        assert_eq!(factory.active_implementation().await, None);
    }

    #[tokio::test]
    async fn test_set_implementation_invalidates_memoized_instance() {
        let store = Arc::new(PingOnlyStore::default());
        store.reachable.store(true, Ordering::SeqCst);
        let factory = factory(store.clone(), true);

        assert_eq!(
            factory.get_cache().await.unwrap().implementation(),
            CacheImplementation::Redis
        );

        factory.set_implementation(CacheImplementation::Memory).await;
        assert_eq!(factory.active_implementation().await, None);
        assert_eq!(
            factory.get_cache().await.unwrap().implementation(),
            CacheImplementation::Memory
        );

        factory.set_implementation(CacheImplementation::Redis).await;
        assert_eq!(
            factory.get_cache().await.unwrap().implementation(),
            CacheImplementation::Redis
        );
        assert_eq!(store.pings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fallback_shares_memory_store() {
        let store = Arc::new(PingOnlyStore::default());
        let factory = factory(store, true);

        let cache = factory.get_cache().await.unwrap();
        cache.set("study_offer:1", &"x", Some(60)).await;
        assert_eq!(factory.memory_cache().stats().await.keys, 1);
    }
}
