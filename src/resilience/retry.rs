//! Retry with exponential backoff and jitter.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::{ProtectionError, ProtectionResult};

/// Substrings treated as transient by the protected database helpers.
pub const DEFAULT_RETRYABLE_ERRORS: [&str; 4] = ["ECONNRESET", "ETIMEDOUT", "disconnect", "timeout"];

const JITTER_MIN: f64 = 0.85;
const JITTER_MAX: f64 = 1.15;

/// Called with the 1-based retry number before each backoff sleep.
pub type RetryCallback = Arc<dyn Fn(u32, &ProtectionError) + Send + Sync>;

#[derive(Clone)]
pub struct RetryOptions {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// When set, only errors whose message or name contains one of these are retried
    pub retryable_errors: Option<Vec<String>>,
    pub on_retry: Option<RetryCallback>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            retryable_errors: None,
            on_retry: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("retryable_errors", &self.retryable_errors)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl RetryOptions {
    pub fn with_retryable_errors<S: AsRef<str>>(mut self, errors: &[S]) -> Self {
        self.retryable_errors = Some(errors.iter().map(|e| e.as_ref().to_string()).collect());
        self
    }

    pub fn with_on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, &ProtectionError) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }
}

/// Whether `err` may be retried under `allow_list`. No list retries everything.
pub fn is_retryable(err: &ProtectionError, allow_list: Option<&[String]>) -> bool {
    let Some(allow_list) = allow_list else {
        return true;
    };
    let message = err.message();
    let name = err.name();
    allow_list
        .iter()
        .any(|needle| message.contains(needle.as_str()) || name.contains(needle.as_str()))
}

/// `min(base * 2^attempt * jitter, max)` for an explicit jitter factor.
pub fn backoff_delay_with_jitter(
    attempt: u32,
    base: Duration,
    max: Duration,
    jitter: f64,
) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = base.as_secs_f64() * 2f64.powi(exponent) * jitter;
    Duration::from_secs_f64(secs.min(max.as_secs_f64()).max(0.0))
}

/// Backoff for `attempt` (0-based) with a random jitter in [0.85, 1.15].
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let jitter = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
    backoff_delay_with_jitter(attempt, base, max, jitter)
}

/// Runs `operation` up to `max_retries + 1` times.
///
/// Errors outside the allow-list propagate on first occurrence. After the
/// last attempt the final error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(mut operation: F, options: &RetryOptions) -> ProtectionResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<ProtectionError>,
{
    let mut attempt: u32 = 0;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err.into(),
        };

        if attempt >= options.max_retries
            || !is_retryable(&err, options.retryable_errors.as_deref())
        {
            return Err(err);
        }

        let delay = backoff_delay(attempt, options.base_delay, options.max_delay);
        if let Some(on_retry) = &options.on_retry {
            on_retry(attempt + 1, &err);
        }
        warn!(
            attempt = attempt + 1,
            max_retries = options.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying operation"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
