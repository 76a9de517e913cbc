//! Resilient Cache - caching and protected data access core
//!
//! Provides a two-tier cache (memory or Redis) with TTL tiers and
//! dependency invalidation, plus circuit breakers, retries, timeouts and
//! an in-memory monitoring service.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod monitoring;
pub mod resilience;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheFactory};
pub use config::Config;
pub use error::{ApiError, CacheError, ProtectionError, ProtectionResult};
pub use monitoring::MonitoringService;
pub use resilience::{CircuitBreakerRegistry, ProtectedOperations};
pub use tasks::BackgroundTasks;
