//! Error types for the cache and resilience layers
//!
//! Provides unified error handling using thiserror.
//!
//! - [`CacheError`]: failures reaching the distributed store. These never
//!   escape the cache backends; they are logged and turned into safe defaults.
//! - [`ProtectionError`]: fail-fast, timeout and operation failures surfaced
//!   by the circuit breaker and the protected database helpers.
//! - [`ApiError`]: errors returned by the operational HTTP endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Errors raised by the distributed store client.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Failed to reach the backing store
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Failed to serialize or deserialize a cached value
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// A store command timed out
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// Any other error reported by the store
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// No backend could be selected
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Result type for cache store operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

// == Protection Error Enum ==
/// Errors produced by protected operations.
#[derive(Error, Debug)]
pub enum ProtectionError {
    /// The circuit is open and the reset timeout has not elapsed
    #[error("Circuit breaker '{name}' is OPEN; next attempt in {retry_after_ms}ms")]
    CircuitOpen { name: String, retry_after_ms: u64 },

    /// The circuit is half-open and all trial calls are taken
    #[error("Circuit breaker '{name}' is HALF_OPEN and at capacity ({max_calls} trial calls)")]
    HalfOpenAtCapacity { name: String, max_calls: u32 },

    /// The operation did not settle in time
    #[error("{message} (timeout after {timeout_ms}ms)")]
    Timeout { message: String, timeout_ms: u64 },

    /// The operation itself failed
    #[error(transparent)]
    Operation(#[from] anyhow::Error),
}

impl ProtectionError {
    /// Stable type name, matched alongside the message by retry allow-lists.
    pub fn name(&self) -> &'static str {
        match self {
            ProtectionError::CircuitOpen { .. } => "CircuitOpenError",
            ProtectionError::HalfOpenAtCapacity { .. } => "CircuitHalfOpenError",
            ProtectionError::Timeout { .. } => "TimeoutError",
            ProtectionError::Operation(_) => "OperationError",
        }
    }

    /// True for rejections that never invoked the operation.
    pub fn is_fail_fast(&self) -> bool {
        matches!(
            self,
            ProtectionError::CircuitOpen { .. } | ProtectionError::HalfOpenAtCapacity { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProtectionError::Timeout { .. })
    }

    /// Full message including the source chain of wrapped operation errors.
    pub fn message(&self) -> String {
        match self {
            ProtectionError::Operation(err) => format!("{:#}", err),
            other => other.to_string(),
        }
    }
}

/// Result type for protected operations.
pub type ProtectionResult<T> = std::result::Result<T, ProtectionError>;

// == API Error Enum ==
/// Errors returned by the operational HTTP endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No cache backend is available
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Unavailable(msg) => ApiError::Unavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Convenience Result type for the HTTP handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
