//! Monitoring Service
//!
//! Sliding-window recorder for metrics, query outcomes and errors.
//! Every tracking call is infallible; a panicking alert callback is caught
//! and logged.

use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Display};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::monitoring::metrics::{
    now_millis, ErrorAlert, ErrorStat, MetricFilter, MetricSample, QueryFilter, QueryMetric,
    QueryStatus, Tags,
};

/// Metric name checked against the slow query threshold.
pub const QUERY_DURATION_METRIC: &str = "query_duration";

/// Callback fired when an error type reaches the critical threshold.
pub type AlertCallback = Arc<dyn Fn(&ErrorAlert) + Send + Sync>;

// == Configuration ==
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub max_metrics: usize,
    pub max_query_metrics: usize,
    /// Age after which prune drops entries
    pub retention: Duration,
    pub prune_interval: Duration,
    pub slow_query_threshold_ms: u64,
    pub critical_error_threshold: u32,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            max_metrics: 1000,
            max_query_metrics: 1000,
            retention: Duration::from_secs(3600),
            prune_interval: Duration::from_secs(300),
            slow_query_threshold_ms: 500,
            critical_error_threshold: 5,
        }
    }
}

impl MonitoringConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retention: Duration::from_secs(config.metrics_retention),
            prune_interval: Duration::from_secs(config.metrics_prune_interval),
            slow_query_threshold_ms: config.slow_query_threshold_ms,
            critical_error_threshold: config.critical_error_threshold.max(1),
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct ErrorCounter {
    count: u32,
    total: u64,
    last_message: String,
    last_seen: i64,
}

#[derive(Debug, Default)]
struct MonitoringState {
    metrics: VecDeque<MetricSample>,
    queries: VecDeque<QueryMetric>,
    errors: HashMap<String, ErrorCounter>,
}

/// What a prune pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub metrics_removed: usize,
    pub queries_removed: usize,
    pub error_counters_reset: usize,
}

// == Monitoring Service ==
/// Process-wide metrics recorder, injected where needed as `Arc<MonitoringService>`.
pub struct MonitoringService {
    config: MonitoringConfig,
    slow_query_threshold_ms: AtomicU64,
    state: Mutex<MonitoringState>,
    callbacks: RwLock<Vec<AlertCallback>>,
}

impl fmt::Debug for MonitoringService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringService")
            .field("config", &self.config)
            .field("slow_query_threshold_ms", &self.slow_query_threshold_ms())
            .finish()
    }
}

impl Default for MonitoringService {
    fn default() -> Self {
        Self::new(MonitoringConfig::default())
    }
}

impl MonitoringService {
    pub fn new(config: MonitoringConfig) -> Self {
        Self {
            slow_query_threshold_ms: AtomicU64::new(config.slow_query_threshold_ms),
            state: Mutex::new(MonitoringState::default()),
            callbacks: RwLock::new(Vec::new()),
            config,
        }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    pub fn slow_query_threshold_ms(&self) -> u64 {
        self.slow_query_threshold_ms.load(Ordering::Relaxed)
    }

    /// Overrides the slow query threshold.
    pub fn set_slow_query_threshold(&self, threshold_ms: u64) {
        self.slow_query_threshold_ms
            .store(threshold_ms, Ordering::Relaxed);
        debug!(threshold_ms, "Slow query threshold updated");
    }

    /// Registers a callback for critical error alerts.
    pub fn on_critical_error<F>(&self, callback: F)
    where
        F: Fn(&ErrorAlert) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Arc::new(callback));
    }

    // == Tracking ==
    pub fn track_metric(&self, name: impl Into<String>, value: f64, tags: Tags) {
        self.track_sample(MetricSample::new(name, value, tags));
    }

    /// Appends a prepared sample, dropping the oldest once the window is full.
    pub fn track_sample(&self, sample: MetricSample) {
        if sample.name == QUERY_DURATION_METRIC && sample.value > self.slow_threshold() {
            warn!(
                duration_ms = sample.value,
                threshold_ms = self.slow_query_threshold_ms(),
                "Slow operation detected"
            );
        }

        let mut state = self.state.lock();
        state.metrics.push_back(sample);
        while state.metrics.len() > self.config.max_metrics {
            state.metrics.pop_front();
        }
    }

    /// Records a query outcome and mirrors it as `db.<collection>.<operation>`.
    pub fn track_query(&self, query: QueryMetric) {
        if query.duration_ms > self.slow_threshold() {
            warn!(
                query_id = %query.query_id,
                collection = %query.collection,
                operation = %query.operation,
                duration_ms = query.duration_ms,
                "Slow query detected"
            );
        }

        let mut tags = Tags::new();
        tags.insert("status".to_string(), query.status.as_str().to_string());
        tags.insert("query_id".to_string(), query.query_id.clone());
        let mirrored = MetricSample::at(query.metric_name(), query.duration_ms, tags, query.timestamp);

        let mut state = self.state.lock();
        state.queries.push_back(query);
        while state.queries.len() > self.config.max_query_metrics {
            state.queries.pop_front();
        }
        state.metrics.push_back(mirrored);
        while state.metrics.len() > self.config.max_metrics {
            state.metrics.pop_front();
        }
    }

    /// Counts an error of `error_type` and alerts once the count reaches the
    /// critical threshold. The count then restarts from zero.
    pub fn track_error(&self, error_type: &str, error: &dyn Display) {
        let message = error.to_string();
        error!(error_type, error = %message, "Tracked error");

        let threshold = self.config.critical_error_threshold;
        let timestamp = now_millis();
        let alert = {
            let mut state = self.state.lock();
            let counter = state
                .errors
                .entry(error_type.to_string())
                .or_insert_with(|| ErrorCounter {
                    count: 0,
                    total: 0,
                    last_message: String::new(),
                    last_seen: timestamp,
                });
            counter.count += 1;
            counter.total += 1;
            counter.last_message = message;
            counter.last_seen = timestamp;

            if counter.count >= threshold {
                let alert = ErrorAlert {
                    error_type: error_type.to_string(),
                    count: counter.count,
                    threshold,
                    last_message: counter.last_message.clone(),
                    timestamp,
                };
                counter.count = 0;
                Some(alert)
            } else {
                None
            }
        };

        if let Some(alert) = alert {
            self.fire_alert(&alert);
        }
    }

    fn fire_alert(&self, alert: &ErrorAlert) {
        error!(
            error_type = %alert.error_type,
            count = alert.count,
            threshold = alert.threshold,
            "Critical error threshold reached"
        );

        let callbacks: Vec<AlertCallback> = self.callbacks.read().clone();
        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(alert))).is_err() {
                warn!(error_type = %alert.error_type, "Critical error callback panicked");
            }
        }
    }

    fn slow_threshold(&self) -> f64 {
        self.slow_query_threshold_ms() as f64
    }

    // == Read Accessors ==
    /// Matching general metrics, newest first.
    pub fn get_metrics(&self, filter: &MetricFilter) -> Vec<MetricSample> {
        let mut metrics: Vec<MetricSample> = self
            .state
            .lock()
            .metrics
            .iter()
            .rev()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        metrics.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        metrics
    }

    /// Matching query metrics, newest first.
    pub fn get_query_metrics(&self, filter: &QueryFilter) -> Vec<QueryMetric> {
        let mut queries: Vec<QueryMetric> = self
            .state
            .lock()
            .queries
            .iter()
            .rev()
            .filter(|q| filter.matches(q))
            .cloned()
            .collect();
        queries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        queries
    }

    /// Per-type error stats, most recently seen first.
    pub fn get_error_stats(&self) -> Vec<ErrorStat> {
        let mut stats: Vec<ErrorStat> = self
            .state
            .lock()
            .errors
            .iter()
            .map(|(error_type, counter)| ErrorStat {
                error_type: error_type.clone(),
                count: counter.count,
                total: counter.total,
                last_message: counter.last_message.clone(),
                last_seen: counter.last_seen,
            })
            .collect();
        stats.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.error_type.cmp(&b.error_type))
        });
        stats
    }

    /// Number of failed queries currently in the window.
    pub fn failed_query_count(&self) -> usize {
        self.state
            .lock()
            .queries
            .iter()
            .filter(|q| q.status == QueryStatus::Error)
            .count()
    }

    // == Pruning ==
    /// Drops everything older than the retention horizon.
    pub fn prune(&self) -> PruneSummary {
        let retention_ms = i64::try_from(self.config.retention.as_millis()).unwrap_or(i64::MAX);
        self.prune_older_than(now_millis().saturating_sub(retention_ms))
    }

    /// Drops entries stamped before `cutoff_ms` and restarts every rolling
    /// error count. Lifetime totals are kept.
    pub fn prune_older_than(&self, cutoff_ms: i64) -> PruneSummary {
        let mut state = self.state.lock();

        let metrics_before = state.metrics.len();
        state.metrics.retain(|m| m.timestamp >= cutoff_ms);
        let queries_before = state.queries.len();
        state.queries.retain(|q| q.timestamp >= cutoff_ms);

        let mut error_counters_reset = 0;
        for counter in state.errors.values_mut() {
            if counter.count > 0 {
                counter.count = 0;
                error_counters_reset += 1;
            }
        }

        let summary = PruneSummary {
            metrics_removed: metrics_before - state.metrics.len(),
            queries_removed: queries_before - state.queries.len(),
            error_counters_reset,
        };
        debug!(
            metrics_removed = summary.metrics_removed,
            queries_removed = summary.queries_removed,
            "Monitoring data pruned"
        );
        summary
    }
}
