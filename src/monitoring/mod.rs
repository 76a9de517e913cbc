//! Monitoring Module
//!
//! In-memory, bounded recorder for metrics, query outcomes and error counts.

mod metrics;
mod service;

// Re-export public types
pub use metrics::{
    now_millis, tags, ErrorAlert, ErrorStat, MetricFilter, MetricSample, QueryFilter,
    QueryMetric, QueryStatus, Tags,
};
pub use service::{
    AlertCallback, MonitoringConfig, MonitoringService, PruneSummary, QUERY_DURATION_METRIC,
};
