//! Response DTOs for the operational API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::{CacheImplementation, CacheStats, InvalidationReport};

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Backend currently serving the cache, if resolved
    pub cache_backend: Option<CacheImplementation>,
}

impl HealthResponse {
    /// Creates a healthy response
    pub fn healthy(cache_backend: Option<CacheImplementation>) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
            cache_backend,
        }
    }
}

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache_backend: Option<CacheImplementation>,
    /// Memory cache statistics
    pub memory: CacheStats,
}

impl StatsResponse {
    pub fn new(cache_backend: Option<CacheImplementation>, memory: CacheStats) -> Self {
        Self {
            cache_backend,
            memory,
        }
    }
}

/// Response body for the circuit reset endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub message: String,
    /// Number of circuits reset
    pub reset: usize,
}

impl ResetResponse {
    pub fn new(reset: usize) -> Self {
        Self {
            message: format!("{} circuit breaker(s) reset", reset),
            reset,
        }
    }
}

/// Response body for DELETE /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub key: String,
    #[serde(flatten)]
    pub report: InvalidationReport,
}

impl InvalidateResponse {
    pub fn new(key: impl Into<String>, report: InvalidationReport) -> Self {
        Self {
            key: key.into(),
            report,
        }
    }
}

/// Response body for DELETE /cache?pattern=
#[derive(Debug, Clone, Serialize)]
pub struct ClearPatternResponse {
    pub pattern: String,
    /// Number of keys removed
    pub removed: u64,
}

impl ClearPatternResponse {
    pub fn new(pattern: impl Into<String>, removed: u64) -> Self {
        Self {
            pattern: pattern.into(),
            removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response() {
        let resp = HealthResponse::healthy(Some(CacheImplementation::Memory));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["cache_backend"], "memory");
    }

    #[test]
    fn test_reset_response() {
        let resp = ResetResponse::new(2);
        assert_eq!(resp.reset, 2);
        assert!(resp.message.contains('2'));
    }

    #[test]
    fn test_invalidate_response_flattens_report() {
        let resp = InvalidateResponse::new(
            "study_offer:1",
            InvalidationReport {
                key_removed: true,
                dependents_removed: vec!["study_offer:list:a".to_string()],
                dependents_missing: Vec::new(),
            },
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["key"], "study_offer:1");
        assert_eq!(json["key_removed"], true);
        assert_eq!(json["dependents_removed"][0], "study_offer:list:a");
    }

    #[test]
    fn test_stats_response_serialize() {
        let resp = StatsResponse::new(None, CacheStats::default());
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json["cache_backend"].is_null());
        assert_eq!(json["memory"]["hits"], 0);
    }
}
