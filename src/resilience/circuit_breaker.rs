//! Circuit Breaker
//!
//! Per-resource guard with three states: Closed (calls pass, failures are
//! counted), Open (calls fail fast) and HalfOpen (a bounded number of trial
//! calls probe recovery).

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{ProtectionError, ProtectionResult};
use crate::monitoring::{tags, MonitoringService};

// == Circuit State ==
/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Normal operation
    Closed,
    /// Failing fast
    Open,
    /// Testing recovery
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }

    /// The only edges the breaker itself follows.
    pub fn can_transition_to(&self, next: CircuitState) -> bool {
        matches!(
            (self, next),
            (CircuitState::Closed, CircuitState::Open)
                | (CircuitState::Open, CircuitState::HalfOpen)
                | (CircuitState::HalfOpen, CircuitState::Closed)
                | (CircuitState::HalfOpen, CircuitState::Open)
        )
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Options ==
/// Per-circuit configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerOptions {
    /// Failures in Closed, cumulative since the last reset, before opening
    pub failure_threshold: u32,
    /// Time spent Open before trial calls are allowed
    pub reset_timeout: Duration,
    /// Trial calls allowed while HalfOpen; this many successes close the circuit
    pub max_half_open_calls: u32,
    /// Optional per-call timeout
    pub timeout: Option<Duration>,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            max_half_open_calls: 3,
            timeout: None,
        }
    }
}

// == Stats ==
/// Point-in-time snapshot of a circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    pub reject_count: u64,
    pub last_failure: Option<String>,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub next_attempt_time: Option<DateTime<Utc>>,
    pub next_attempt_in_ms: Option<u64>,
    pub half_open_successes: u32,
    pub half_open_failures: u32,
    pub half_open_calls: u32,
    pub last_state_change_time: DateTime<Utc>,
}

#[derive(Debug)]
struct CircuitRecord {
    state: CircuitState,
    failure_count: u64,
    success_count: u64,
    reject_count: u64,
    last_failure: Option<String>,
    last_failure_time: Option<DateTime<Utc>>,
    next_attempt: Option<Instant>,
    half_open_successes: u32,
    half_open_failures: u32,
    half_open_calls: u32,
    last_state_change_time: DateTime<Utc>,
    /// Bumped whenever a scheduled half-open timer becomes stale
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl CircuitRecord {
    fn new(generation: u64) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            reject_count: 0,
            last_failure: None,
            last_failure_time: None,
            next_attempt: None,
            half_open_successes: 0,
            half_open_failures: 0,
            half_open_calls: 0,
            last_state_change_time: Utc::now(),
            generation,
            timer: None,
        }
    }

    fn cancel_timer(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Instant `delay` from now, saturating a century out.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 86_400);

struct BreakerInner {
    name: String,
    options: CircuitBreakerOptions,
    record: Mutex<CircuitRecord>,
    monitoring: Option<Arc<MonitoringService>>,
}

// == Circuit Breaker ==
/// Guard for one named resource. Clones share state.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl CircuitBreaker {
    /// Creates a closed circuit. `max_half_open_calls` is raised to at least 1.
    pub fn new(
        name: impl Into<String>,
        mut options: CircuitBreakerOptions,
        monitoring: Option<Arc<MonitoringService>>,
    ) -> Self {
        let name = name.into();
        options.max_half_open_calls = options.max_half_open_calls.max(1);
        debug!(
            circuit = %name,
            failure_threshold = options.failure_threshold,
            reset_timeout_ms = options.reset_timeout.as_millis() as u64,
            max_half_open_calls = options.max_half_open_calls,
            "Circuit breaker initialized"
        );

        Self {
            inner: Arc::new(BreakerInner {
                name,
                options,
                record: Mutex::new(CircuitRecord::new(0)),
                monitoring,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> &CircuitBreakerOptions {
        &self.inner.options
    }

    pub fn state(&self) -> CircuitState {
        self.inner.record.lock().state
    }

    /// Runs `operation` under the circuit.
    ///
    /// Rejected calls never invoke `operation`. A configured per-call timeout
    /// counts as a failure.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> ProtectionResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<ProtectionError>,
    {
        let window = self.admit()?;

        let result = match self.inner.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(outcome) => outcome.map_err(Into::into),
                Err(_) => Err(ProtectionError::Timeout {
                    message: format!("Circuit breaker '{}' operation timed out", self.inner.name),
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => operation().await.map_err(Into::into),
        };

        match &result {
            Ok(_) => self.record_success(window),
            Err(err) => self.record_failure(err, window),
        }
        result
    }

    /// Admits a call and returns the generation it was admitted under.
    fn admit(&self) -> ProtectionResult<u64> {
        let mut record = self.inner.record.lock();

        if record.state == CircuitState::Open {
            let now = Instant::now();
            match record.next_attempt {
                Some(at) if now < at => {
                    record.reject_count += 1;
                    let retry_after_ms = at.duration_since(now).as_millis() as u64;
                    warn!(circuit = %self.inner.name, retry_after_ms, "Circuit breaker rejected call");
                    self.emit("circuit_breaker.rejected", CircuitState::Open);
                    return Err(ProtectionError::CircuitOpen {
                        name: self.inner.name.clone(),
                        retry_after_ms,
                    });
                }
                _ => self.transition(&mut record, CircuitState::HalfOpen),
            }
        }

        if record.state == CircuitState::HalfOpen {
            let max_calls = self.inner.options.max_half_open_calls;
            if record.half_open_calls >= max_calls {
                record.reject_count += 1;
                warn!(circuit = %self.inner.name, max_calls, "Circuit breaker half-open limit reached");
                self.emit("circuit_breaker.rejected", CircuitState::HalfOpen);
                return Err(ProtectionError::HalfOpenAtCapacity {
                    name: self.inner.name.clone(),
                    max_calls,
                });
            }
            record.half_open_calls += 1;
        }

        Ok(record.generation)
    }

    /// Trial bookkeeping only applies to calls admitted by the current
    /// half-open window.
    fn record_success(&self, window: u64) {
        let mut record = self.inner.record.lock();
        record.success_count += 1;
        self.emit("circuit_breaker.success", record.state);

        if record.state == CircuitState::HalfOpen && record.generation == window {
            record.half_open_successes += 1;
            if record.half_open_successes >= self.inner.options.max_half_open_calls {
                self.transition(&mut record, CircuitState::Closed);
            }
        }
    }

    fn record_failure(&self, err: &ProtectionError, window: u64) {
        let mut record = self.inner.record.lock();
        record.failure_count += 1;
        record.last_failure = Some(err.message());
        record.last_failure_time = Some(Utc::now());
        self.emit("circuit_breaker.failure", record.state);

        match record.state {
            CircuitState::Closed => {
                if record.failure_count >= u64::from(self.inner.options.failure_threshold) {
                    self.transition(&mut record, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen if record.generation == window => {
                record.half_open_failures += 1;
                self.transition(&mut record, CircuitState::Open);
            }
            CircuitState::HalfOpen => {
                debug!(circuit = %self.inner.name, "Ignored failure from an earlier window");
            }
            CircuitState::Open => {}
        }
    }

    // == Transitions ==
    fn transition(&self, record: &mut CircuitRecord, next: CircuitState) {
        if !record.state.can_transition_to(next) {
            debug!(circuit = %self.inner.name, from = %record.state, to = %next, "Ignored invalid transition");
            return;
        }
        self.apply_state(record, next);
    }

    /// Enters `next` with its side effects, without checking the edge.
    fn apply_state(&self, record: &mut CircuitRecord, next: CircuitState) {
        let previous = record.state;
        record.cancel_timer();
        record.state = next;
        record.last_state_change_time = Utc::now();
        record.half_open_calls = 0;
        record.half_open_successes = 0;

        match next {
            CircuitState::Open => {
                record.next_attempt = Some(deadline_after(self.inner.options.reset_timeout));
                self.schedule_half_open(record);
                error!(
                    circuit = %self.inner.name,
                    failure_count = record.failure_count,
                    reset_timeout_ms = self.inner.options.reset_timeout.as_millis() as u64,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                record.next_attempt = None;
                record.half_open_failures = 0;
                info!(circuit = %self.inner.name, "Circuit breaker half-open, probing recovery");
            }
            CircuitState::Closed => {
                record.next_attempt = None;
                record.failure_count = 0;
                record.half_open_failures = 0;
                info!(circuit = %self.inner.name, "Circuit breaker closed (recovered)");
            }
        }

        if let Some(monitoring) = &self.inner.monitoring {
            monitoring.track_metric(
                "circuit_breaker.state_change",
                1.0,
                tags(&[
                    ("circuit", self.inner.name.as_str()),
                    ("state", next.as_str()),
                    ("from", previous.as_str()),
                ]),
            );
        }
    }

    /// Spawns the automatic Open to HalfOpen transition, when a runtime is present.
    fn schedule_half_open(&self, record: &mut CircuitRecord) {
        let Ok(handle) = Handle::try_current() else {
            return;
        };
        let inner: Weak<BreakerInner> = Arc::downgrade(&self.inner);
        let generation = record.generation;
        let delay = self.inner.options.reset_timeout;

        record.timer = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = inner.upgrade() {
                CircuitBreaker { inner }.on_reset_timeout(generation);
            }
        }));
    }

    fn on_reset_timeout(&self, generation: u64) {
        let mut record = self.inner.record.lock();
        if record.generation != generation || record.state != CircuitState::Open {
            return;
        }
        // this task is the timer; drop the handle instead of aborting it
        record.timer = None;
        self.transition(&mut record, CircuitState::HalfOpen);
    }

    fn emit(&self, metric: &str, state: CircuitState) {
        if let Some(monitoring) = &self.inner.monitoring {
            monitoring.track_metric(
                metric,
                1.0,
                tags(&[("circuit", self.inner.name.as_str()), ("state", state.as_str())]),
            );
        }
    }

    // == Administration ==
    /// Forces a state regardless of the usual edges.
    pub fn force_state(&self, state: CircuitState) {
        warn!(circuit = %self.inner.name, state = %state, "Circuit breaker state forced");
        let mut record = self.inner.record.lock();
        self.apply_state(&mut record, state);
    }

    /// Returns to Closed with every counter at zero.
    pub fn reset(&self) {
        let mut record = self.inner.record.lock();
        let previous = record.state;
        record.cancel_timer();
        let generation = record.generation;
        *record = CircuitRecord::new(generation);
        info!(circuit = %self.inner.name, from = %previous, "Circuit breaker reset");

        if let Some(monitoring) = &self.inner.monitoring {
            monitoring.track_metric(
                "circuit_breaker.state_change",
                1.0,
                tags(&[
                    ("circuit", self.inner.name.as_str()),
                    ("state", CircuitState::Closed.as_str()),
                    ("from", previous.as_str()),
                ]),
            );
        }
    }

    /// Cancels the pending half-open timer.
    pub fn shutdown(&self) {
        self.inner.record.lock().cancel_timer();
    }

    pub fn stats(&self) -> CircuitStats {
        let record = self.inner.record.lock();
        let remaining = record
            .next_attempt
            .map(|at| at.saturating_duration_since(Instant::now()));

        CircuitStats {
            name: self.inner.name.clone(),
            state: record.state,
            failure_count: record.failure_count,
            success_count: record.success_count,
            reject_count: record.reject_count,
            last_failure: record.last_failure.clone(),
            last_failure_time: record.last_failure_time,
            next_attempt_time: remaining.and_then(|d| {
                chrono::Duration::from_std(d)
                    .ok()
                    .and_then(|d| Utc::now().checked_add_signed(d))
            }),
            next_attempt_in_ms: remaining.map(|d| d.as_millis() as u64),
            half_open_successes: record.half_open_successes,
            half_open_failures: record.half_open_failures,
            half_open_calls: record.half_open_calls,
            last_state_change_time: record.last_state_change_time,
        }
    }
}
