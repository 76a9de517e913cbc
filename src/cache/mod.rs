//! Cache Module
//!
//! Two interchangeable backends (process memory and a distributed store)
//! behind one [`CacheBackend`] contract, a [`CacheFactory`] that picks one,
//! and the typed [`Cache`] facade with dependency-tracked invalidation.

mod backend;
mod dependencies;
mod entry;
mod facade;
mod factory;
mod memory;
mod redis;
mod stats;
mod store;
mod ttl;


// Re-export public types
pub use backend::{CacheBackend, CacheImplementation, SoftFailure, SoftFailureLog};
pub use dependencies::DependencyTracker;
pub use entry::CacheEntry;
pub use facade::{Cache, InvalidationReport, WarmupFetch, WarmupItem, WarmupOutcome};
pub use factory::{CacheFactory, CacheSettings};
pub use memory::MemoryCache;
pub use self::redis::{is_reconnectable, reconnect_delay, KeyValueStore, RedisCache, RedisStore};
pub use stats::CacheStats;
pub use store::MemoryStore;
pub use ttl::{TtlPolicy, TtlTier};
