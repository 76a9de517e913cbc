//! Deadline wrapper for async operations.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtectionError, ProtectionResult};

/// Awaits `future` for at most `limit`.
///
/// On expiry the future is dropped and a [`ProtectionError::Timeout`]
/// carrying `message` is returned. Work the future already handed off (a
/// request on the wire, a spawned task) is not recalled, so a timeout means
/// the outcome is unknown.
pub async fn with_timeout<T, E, Fut>(
    future: Fut,
    limit: Duration,
    message: impl Into<String>,
) -> ProtectionResult<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: Into<ProtectionError>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(ProtectionError::Timeout {
            message: message.into(),
            timeout_ms: limit.as_millis() as u64,
        }),
    }
}
