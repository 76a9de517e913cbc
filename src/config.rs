//! Configuration Module
//!
//! Handles loading and managing configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheImplementation, TtlPolicy};
use crate::resilience::CircuitBreakerOptions;

/// Runtime configuration for the cache core and its operational server.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection string for the distributed cache
    pub redis_url: String,
    /// TTL tiers in seconds
    pub ttl: TtlPolicy,
    /// Preferred cache backend
    pub cache_implementation: CacheImplementation,
    /// Downgrade to the memory backend when the distributed one is unavailable
    pub cache_fallback: bool,
    /// Memory cache sweep interval in seconds
    pub sweep_interval: u64,
    /// Cache statistics export interval in seconds
    pub stats_interval: u64,
    /// Monitoring prune interval in seconds
    pub metrics_prune_interval: u64,
    /// Age in seconds after which metrics are pruned
    pub metrics_retention: u64,
    /// Queries slower than this are logged as slow
    pub slow_query_threshold_ms: u64,
    /// Error count per type that triggers an alert
    pub critical_error_threshold: u32,
    /// Default options for lazily created circuit breakers
    pub circuit: CircuitBreakerOptions,
    /// Operational HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Distributed cache URL (default: redis://127.0.0.1:6379)
    /// - `REDIS_TTL_SHORT`, `REDIS_TTL_MEDIUM`, `REDIS_TTL_LONG`, `REDIS_TTL_DAY` -
    ///   TTL tiers in seconds (defaults: 300, 1800, 7200, 86400)
    /// - `CACHE_IMPLEMENTATION` - `redis` or `memory` (default: redis)
    /// - `CACHE_FALLBACK_TO_MEMORY` - Fall back to memory (default: true)
    /// - `CACHE_SWEEP_INTERVAL` - Memory sweep interval in seconds (default: 300)
    /// - `CACHE_STATS_INTERVAL` - Stats export interval in seconds (default: 60)
    /// - `METRICS_PRUNE_INTERVAL` - Metrics prune interval in seconds (default: 300)
    /// - `METRICS_RETENTION` - Metrics retention in seconds (default: 3600)
    /// - `SLOW_QUERY_THRESHOLD_MS` - Slow query threshold (default: 500)
    /// - `CRITICAL_ERROR_THRESHOLD` - Errors per type before alerting (default: 5)
    /// - `CIRCUIT_FAILURE_THRESHOLD` - Failures before opening (default: 5)
    /// - `CIRCUIT_RESET_TIMEOUT_MS` - Time spent open (default: 30000)
    /// - `CIRCUIT_HALF_OPEN_MAX_CALLS` - Trial calls while half-open (default: 3)
    /// - `CIRCUIT_CALL_TIMEOUT_MS` - Per-call timeout (default: none)
    /// - `SERVER_PORT` - Operational HTTP port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ttl_defaults = TtlPolicy::default();
        let circuit_defaults = CircuitBreakerOptions::default();

        Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            ttl: TtlPolicy::new(
                env_or("REDIS_TTL_SHORT", ttl_defaults.short),
                env_or("REDIS_TTL_MEDIUM", ttl_defaults.medium),
                env_or("REDIS_TTL_LONG", ttl_defaults.long),
                env_or("REDIS_TTL_DAY", ttl_defaults.day),
            ),
            cache_implementation: env_or("CACHE_IMPLEMENTATION", defaults.cache_implementation),
            cache_fallback: env_or("CACHE_FALLBACK_TO_MEMORY", defaults.cache_fallback),
            sweep_interval: env_or("CACHE_SWEEP_INTERVAL", defaults.sweep_interval),
            stats_interval: env_or("CACHE_STATS_INTERVAL", defaults.stats_interval),
            metrics_prune_interval: env_or(
                "METRICS_PRUNE_INTERVAL",
                defaults.metrics_prune_interval,
            ),
            metrics_retention: env_or("METRICS_RETENTION", defaults.metrics_retention),
            slow_query_threshold_ms: env_or(
                "SLOW_QUERY_THRESHOLD_MS",
                defaults.slow_query_threshold_ms,
            ),
            critical_error_threshold: env_or(
                "CRITICAL_ERROR_THRESHOLD",
                defaults.critical_error_threshold,
            ),
            circuit: CircuitBreakerOptions {
                failure_threshold: env_or(
                    "CIRCUIT_FAILURE_THRESHOLD",
                    circuit_defaults.failure_threshold,
                ),
                reset_timeout: Duration::from_millis(env_or(
                    "CIRCUIT_RESET_TIMEOUT_MS",
                    circuit_defaults.reset_timeout.as_millis() as u64,
                )),
                max_half_open_calls: env_or(
                    "CIRCUIT_HALF_OPEN_MAX_CALLS",
                    circuit_defaults.max_half_open_calls,
                )
                .max(1),
                timeout: env::var("CIRCUIT_CALL_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis),
            },
            server_port: env_or("SERVER_PORT", defaults.server_port),
        }
    }
}

/// Reads and parses an environment variable, falling back on absence or parse failure.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            ttl: TtlPolicy::default(),
            cache_implementation: CacheImplementation::Redis,
            cache_fallback: true,
            sweep_interval: 300,
            stats_interval: 60,
            metrics_prune_interval: 300,
            metrics_retention: 3600,
            slow_query_threshold_ms: 500,
            critical_error_threshold: 5,
            circuit: CircuitBreakerOptions::default(),
            server_port: 3000,
        }
    }
}
