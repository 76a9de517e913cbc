//! API Handlers
//!
//! HTTP request handlers for the operational endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::{CacheFactory, CacheSettings};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{
    ClearPatternResponse, HealthResponse, InvalidateResponse, PatternQuery, ResetCircuitsRequest,
    ResetResponse, StatsResponse,
};
use crate::monitoring::{
    ErrorStat, MetricFilter, MetricSample, MonitoringConfig, MonitoringService, QueryFilter,
    QueryMetric,
};
use crate::resilience::{CircuitBreakerRegistry, CircuitStats, ProtectedOperations};

/// Application state shared across all handlers.
///
/// This is the composition root's set of shared services; route handlers
/// and domain code receive it instead of reaching for globals.
#[derive(Clone)]
pub struct AppState {
    /// Cache backend selection and the memory backend
    pub cache: Arc<CacheFactory>,
    pub monitoring: Arc<MonitoringService>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    /// Timeout, retry and breaker helpers for database access
    pub protected: Arc<ProtectedOperations>,
}

impl AppState {
    /// Wires the protected operation helpers onto existing services.
    pub fn new(
        cache: CacheFactory,
        monitoring: Arc<MonitoringService>,
        breakers: Arc<CircuitBreakerRegistry>,
    ) -> Self {
        let protected = Arc::new(ProtectedOperations::new(
            monitoring.clone(),
            breakers.clone(),
        ));
        Self {
            cache: Arc::new(cache),
            monitoring,
            breakers,
            protected,
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &Config) -> Self {
        let monitoring = Arc::new(MonitoringService::new(MonitoringConfig::from_config(config)));
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            config.circuit.clone(),
            Some(monitoring.clone()),
        ));
        let cache = CacheFactory::new(CacheSettings::from_config(config), Some(monitoring.clone()));
        Self::new(cache, monitoring, breakers)
    }
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        state.cache.active_implementation().await,
    ))
}

/// Handler for GET /stats
///
/// Returns memory cache statistics and the active backend.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.memory_cache().stats().await;
    Json(StatsResponse::new(
        state.cache.active_implementation().await,
        stats,
    ))
}

/// Handler for GET /circuits
pub async fn circuits_handler(State(state): State<AppState>) -> Json<Vec<CircuitStats>> {
    Json(state.breakers.all_stats())
}

/// Handler for POST /circuits/reset
///
/// Resets the circuits named in the body, or all of them without a body.
pub async fn reset_circuits_handler(
    State(state): State<AppState>,
    body: Option<Json<ResetCircuitsRequest>>,
) -> Json<ResetResponse> {
    let names = body.and_then(|Json(req)| req.names);
    let reset = match names {
        Some(names) => state.breakers.reset_selected(&names),
        None => state.breakers.reset_all(),
    };
    Json(ResetResponse::new(reset))
}

/// Handler for POST /circuits/:name/reset
pub async fn reset_circuit_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ResetResponse>> {
    let breaker = state
        .breakers
        .get(&name)
        .ok_or_else(|| ApiError::NotFound(format!("Circuit breaker '{}' not found", name)))?;
    breaker.reset();
    Ok(Json(ResetResponse::new(1)))
}

/// Handler for GET /metrics
pub async fn metrics_handler(
    State(state): State<AppState>,
    Query(filter): Query<MetricFilter>,
) -> Json<Vec<MetricSample>> {
    Json(state.monitoring.get_metrics(&filter))
}

/// Handler for GET /metrics/queries
pub async fn query_metrics_handler(
    State(state): State<AppState>,
    Query(filter): Query<QueryFilter>,
) -> Json<Vec<QueryMetric>> {
    Json(state.monitoring.get_query_metrics(&filter))
}

/// Handler for GET /metrics/errors
pub async fn error_stats_handler(State(state): State<AppState>) -> Json<Vec<ErrorStat>> {
    Json(state.monitoring.get_error_stats())
}

/// Handler for DELETE /cache/:key
///
/// Deletes the key and every key registered as dependent on it.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    let cache = state.cache.get_cache().await?;
    let report = cache.invalidate(&key).await;
    Ok(Json(InvalidateResponse::new(key, report)))
}

/// Handler for DELETE /cache?pattern=
///
/// Patterns starting with `*` are refused with 400 so one request cannot
/// empty the whole cache.
pub async fn clear_pattern_handler(
    State(state): State<AppState>,
    Query(query): Query<PatternQuery>,
) -> Result<Json<ClearPatternResponse>> {
    let pattern = query.validated().map_err(ApiError::InvalidRequest)?;
    let cache = state.cache.get_cache().await?;
    let removed = cache.clear_pattern(pattern).await;
    Ok(Json(ClearPatternResponse::new(pattern, removed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheImplementation;
    use crate::resilience::CircuitState;

    fn memory_state() -> AppState {
        AppState::from_config(&Config {
            cache_implementation: CacheImplementation::Memory,
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_health_reports_resolved_backend() {
        let state = memory_state();
        assert!(health_handler(State(state.clone())).await.cache_backend.is_none());

        state.cache.get_cache().await.unwrap();
        let response = health_handler(State(state)).await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.cache_backend, Some(CacheImplementation::Memory));
    }

    #[tokio::test]
    async fn test_invalidate_handler_cascades() {
        let state = memory_state();
        let cache = state.cache.get_cache().await.unwrap();
        cache.set("study_offer:1", &"offer", None).await;
        cache
            .set_with_dependencies("study_offer:list:a", &"list", &["study_offer:1"], None)
            .await;

        let response = invalidate_handler(State(state.clone()), Path("study_offer:1".to_string()))
            .await
            .unwrap();
        assert!(response.report.key_removed);
        assert_eq!(response.report.dependents_removed.len(), 1);

        let stats = stats_handler(State(state)).await;
        assert_eq!(stats.memory.keys, 0);
    }

    #[tokio::test]
    async fn test_clear_pattern_requires_pattern() {
        let state = memory_state();
        let result = clear_pattern_handler(State(state), Query(PatternQuery::default())).await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_clear_pattern_handler() {
        let state = memory_state();
        let cache = state.cache.get_cache().await.unwrap();
        cache.set("study_offer:1", &1, None).await;
        cache.set("study_offer:2", &2, None).await;
        cache.set("user:1", &3, None).await;

        let response = clear_pattern_handler(
            State(state),
            Query(PatternQuery {
                pattern: Some("study_offer:*".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.removed, 2);
    }

    #[tokio::test]
    async fn test_reset_circuit_handlers() {
        let state = memory_state();
        state
            .breakers
            .get_or_create("mongodb", None)
            .force_state(CircuitState::Open);

        let missing = reset_circuit_handler(State(state.clone()), Path("redis".to_string())).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));

        let response = reset_circuit_handler(State(state.clone()), Path("mongodb".to_string()))
            .await
            .unwrap();
        assert_eq!(response.reset, 1);
        assert_eq!(circuits_handler(State(state.clone())).await[0].state, CircuitState::Closed);

        let response = reset_circuits_handler(State(state), None).await;
        assert_eq!(response.reset, 1);
    }

    #[tokio::test]
    async fn test_error_stats_handler() {
        let state = memory_state();
        state.monitoring.track_error("db.find", &"connection reset");

        let stats = error_stats_handler(State(state)).await;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].error_type, "db.find");
    }
}
