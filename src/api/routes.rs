//! API Routes
//!
//! Configures the Axum router with the operational endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    circuits_handler, clear_pattern_handler, error_stats_handler, health_handler,
    invalidate_handler, metrics_handler, query_metrics_handler, reset_circuit_handler,
    reset_circuits_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check with the active cache backend
/// - `GET /stats` - Memory cache statistics
/// - `GET /circuits` - Stats of every circuit breaker
/// - `POST /circuits/reset` - Reset selected (body `names`) or all circuits
/// - `POST /circuits/:name/reset` - Reset one circuit
/// - `GET /metrics` - General metrics (`name`, `since`, `until`)
/// - `GET /metrics/queries` - Query metrics (`collection`, `since`, `until`)
/// - `GET /metrics/errors` - Error counts per type
/// - `DELETE /cache/:key` - Invalidate a key and its dependents
/// - `DELETE /cache?pattern=` - Delete keys by pattern
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/circuits", get(circuits_handler))
        .route("/circuits/reset", post(reset_circuits_handler))
        .route("/circuits/:name/reset", post(reset_circuit_handler))
        .route("/metrics", get(metrics_handler))
        .route("/metrics/queries", get(query_metrics_handler))
        .route("/metrics/errors", get(error_stats_handler))
        .route("/cache", delete(clear_pattern_handler))
        .route("/cache/:key", delete(invalidate_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
