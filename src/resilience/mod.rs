//! Resilience Module
//!
//! Circuit breakers, timeouts, retries and the protected database helpers
//! that combine them.

mod circuit_breaker;
mod protected;
mod registry;
mod retry;
mod timeout;

// Re-export public types
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerOptions, CircuitState, CircuitStats};
pub use protected::{
    DatabaseOperationOptions, ProtectedOperations, QueryOptions, DEFAULT_QUERY_TIMEOUT,
};
pub use registry::CircuitBreakerRegistry;
pub use retry::{
    backoff_delay, backoff_delay_with_jitter, is_retryable, with_retry, RetryCallback,
    RetryOptions, DEFAULT_RETRYABLE_ERRORS,
};
pub use timeout::with_timeout;
