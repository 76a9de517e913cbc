//! Protected database operations
//!
//! Composes, outer to inner: retry, optional circuit breaker, timeout, and
//! the caller's operation. Every attempt is reported to monitoring as a
//! query metric.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ProtectionError, ProtectionResult};
use crate::monitoring::{MonitoringService, QueryMetric, QueryStatus};
use crate::resilience::{
    with_retry, with_timeout, CircuitBreakerOptions, CircuitBreakerRegistry, RetryOptions,
    DEFAULT_RETRYABLE_ERRORS,
};

/// Default deadline for a protected query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Describes one protected query.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub collection: String,
    pub operation: String,
    pub timeout: Duration,
    /// Breaker to run the query through, if any
    pub circuit_breaker_name: Option<String>,
    /// Options used if the breaker does not exist yet
    pub circuit_breaker_options: Option<CircuitBreakerOptions>,
    pub filters: Option<serde_json::Value>,
}

impl QueryOptions {
    pub fn new(collection: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            operation: operation.into(),
            timeout: DEFAULT_QUERY_TIMEOUT,
            circuit_breaker_name: None,
            circuit_breaker_options: None,
            filters: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_circuit_breaker(mut self, name: impl Into<String>) -> Self {
        self.circuit_breaker_name = Some(name.into());
        self
    }

    pub fn with_circuit_breaker_options(mut self, options: CircuitBreakerOptions) -> Self {
        self.circuit_breaker_options = Some(options);
        self
    }

    pub fn with_filters(mut self, filters: serde_json::Value) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// Query options plus the retry policy applied around them.
#[derive(Debug, Clone)]
pub struct DatabaseOperationOptions {
    pub query: QueryOptions,
    pub retry: RetryOptions,
}

impl DatabaseOperationOptions {
    /// Retries with the default transient-error allow-list.
    pub fn new(query: QueryOptions) -> Self {
        Self {
            query,
            retry: RetryOptions::default().with_retryable_errors(&DEFAULT_RETRYABLE_ERRORS),
        }
    }

    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

// == Protected Operations ==
/// Entry point for protected data access, holding the shared monitoring
/// service and breaker registry.
#[derive(Debug)]
pub struct ProtectedOperations {
    monitoring: Arc<MonitoringService>,
    breakers: Arc<CircuitBreakerRegistry>,
    sequence: AtomicU64,
}

impl ProtectedOperations {
    pub fn new(monitoring: Arc<MonitoringService>, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            monitoring,
            breakers,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn monitoring(&self) -> &Arc<MonitoringService> {
        &self.monitoring
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    fn next_query_id(&self, options: &QueryOptions) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}.{}-{}", options.collection, options.operation, seq)
    }

    /// Runs `query_fn` under a deadline and, when named, a circuit breaker.
    ///
    /// The reported duration covers the whole call, breaker and timeout included.
    pub async fn with_protected_query<T, E, F, Fut>(
        &self,
        query_fn: F,
        options: &QueryOptions,
    ) -> ProtectionResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ProtectionError>,
    {
        let query_id = self.next_query_id(options);
        let timeout_message = format!(
            "Query {}.{} timed out",
            options.collection, options.operation
        );
        let started = Instant::now();

        let result = match &options.circuit_breaker_name {
            Some(name) => {
                let breaker = self
                    .breakers
                    .get_or_create(name, options.circuit_breaker_options.clone());
                breaker
                    .execute(move || with_timeout(query_fn(), options.timeout, timeout_message))
                    .await
            }
            None => with_timeout(query_fn(), options.timeout, timeout_message).await,
        };

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let status = if result.is_ok() {
            QueryStatus::Success
        } else {
            QueryStatus::Error
        };
        let mut metric = QueryMetric::new(
            query_id,
            options.operation.clone(),
            options.collection.clone(),
            duration_ms,
            status,
        )
        .with_filters(options.filters.clone());
        if let Err(err) = &result {
            metric = metric.with_error(err.message());
        }
        self.monitoring.track_query(metric);

        result
    }

    /// Retry around [`Self::with_protected_query`]. `operation` is invoked
    /// once per attempt.
    pub async fn with_protected_database_operation<T, E, F, Fut>(
        &self,
        mut operation: F,
        options: &DatabaseOperationOptions,
    ) -> ProtectionResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ProtectionError>,
    {
        with_retry(
            move || {
                let attempt = operation();
                self.with_protected_query(move || attempt, &options.query)
            },
            &options.retry,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::QueryFilter;
    use crate::resilience::CircuitState;
    use std::sync::atomic::AtomicU32;

    fn protected() -> ProtectedOperations {
        ProtectedOperations::new(
            Arc::new(MonitoringService::default()),
            Arc::new(CircuitBreakerRegistry::default()),
        )
    }

    fn fast_retry() -> RetryOptions {
        RetryOptions {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            ..RetryOptions::default()
        }
        .with_retryable_errors(&DEFAULT_RETRYABLE_ERRORS)
    }

    #[tokio::test(start_paused = true)]
    async fn test_protected_query_reports_success_and_failure() {
        let ops = protected();
        let options = QueryOptions::new("study_offers", "find")
            .with_filters(serde_json::json!({"country": "FR"}));

        let value = ops
            .with_protected_query(|| async { Ok::<_, anyhow::Error>(vec![1, 2]) }, &options)
            .await
            .unwrap();
        assert_eq!(value, vec![1, 2]);

        let err = ops
            .with_protected_query(
                || async { Err::<(), _>(anyhow::anyhow!("ValidationError")) },
                &options,
            )
            .await
            .unwrap_err();
        assert!(!err.is_timeout());

        let queries = ops.monitoring().get_query_metrics(&QueryFilter::default());
        assert_eq!(queries.len(), 2);
        assert!(queries.iter().any(|q| q.status == QueryStatus::Error
            && q.error.as_deref() == Some("ValidationError")));
        assert!(queries.iter().all(|q| q.filters.is_some()));
        assert!(queries.iter().all(|q| q.query_id.starts_with("study_offers.find-")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_protected_query_times_out() {
        let ops = protected();
        let options =
            QueryOptions::new("users", "aggregate").with_timeout(Duration::from_millis(50));

        let err = ops
            .with_protected_query(
                || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<_, anyhow::Error>(())
                },
                &options,
            )
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("Query users.aggregate timed out"));
        let queries = ops.monitoring().get_query_metrics(&QueryFilter::default());
        assert!(queries[0].duration_ms >= 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_protected_query_through_named_breaker() {
        let ops = protected();
        let options = QueryOptions::new("study_offers", "find")
            .with_circuit_breaker("mongodb")
            .with_circuit_breaker_options(CircuitBreakerOptions {
                failure_threshold: 1,
                ..CircuitBreakerOptions::default()
            });

        let _ = ops
            .with_protected_query(|| async { Err::<(), _>(anyhow::anyhow!("down")) }, &options)
            .await;
        let breaker = ops.breakers().get("mongodb").unwrap();
        assert_eq!(breaker.state(), CircuitState::Open);

        let err = ops
            .with_protected_query(|| async { Ok::<_, anyhow::Error>(()) }, &options)
            .await
            .unwrap_err();
        assert!(err.is_fail_fast());
        assert_eq!(ops.monitoring().failed_query_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_database_operation_retries_transient_errors() {
        let ops = protected();
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let options = DatabaseOperationOptions::new(QueryOptions::new("users", "findOne"))
            .with_retry(fast_retry());

        let value = ops
            .with_protected_database_operation(
                move || async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(anyhow::anyhow!("read ECONNRESET"))
                    } else {
                        Ok("user")
                    }
                },
                &options,
            )
            .await
            .unwrap();

        assert_eq!(value, "user");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            ops.monitoring()
                .get_query_metrics(&QueryFilter::default())
                .len(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_database_operation_does_not_retry_fail_fast() {
        let ops = protected();
        ops.breakers()
            .get_or_create("mongodb", None)
            .force_state(CircuitState::Open);
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let options = DatabaseOperationOptions::new(
            QueryOptions::new("users", "find").with_circuit_breaker("mongodb"),
        )
        .with_retry(fast_retry());

        let err = ops
            .with_protected_database_operation(
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(())
                },
                &options,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProtectionError::CircuitOpen { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
