//! Metric record types held by the monitoring service.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Free-form metric tags.
pub type Tags = HashMap<String, String>;

/// Builds a tag map from string pairs.
pub fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

// == Metric Sample ==
/// One observation in the general metrics window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub tags: Tags,
}

impl MetricSample {
    /// Creates a sample stamped with the current time.
    pub fn new(name: impl Into<String>, value: f64, tags: Tags) -> Self {
        Self::at(name, value, tags, now_millis())
    }

    pub fn at(name: impl Into<String>, value: f64, tags: Tags, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
            tags,
        }
    }
}

// == Query Metric ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Success => "success",
            QueryStatus::Error => "error",
        }
    }
}

/// One database query outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetric {
    pub query_id: String,
    pub operation: String,
    pub collection: String,
    pub duration_ms: f64,
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl QueryMetric {
    pub fn new(
        query_id: impl Into<String>,
        operation: impl Into<String>,
        collection: impl Into<String>,
        duration_ms: f64,
        status: QueryStatus,
    ) -> Self {
        Self {
            query_id: query_id.into(),
            operation: operation.into(),
            collection: collection.into(),
            duration_ms,
            status,
            filters: None,
            error: None,
            timestamp: now_millis(),
        }
    }

    pub fn with_filters(mut self, filters: Option<serde_json::Value>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Name of the general metric this query is mirrored as.
    pub fn metric_name(&self) -> String {
        format!("db.{}.{}", self.collection, self.operation)
    }
}

// == Filters ==
/// Filter for general metrics. All fields are optional; bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricFilter {
    /// Substring of the metric name
    pub name: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
}

impl MetricFilter {
    pub(crate) fn matches(&self, sample: &MetricSample) -> bool {
        self.name
            .as_deref()
            .map_or(true, |name| sample.name.contains(name))
            && in_range(sample.timestamp, self.since, self.until)
    }
}

/// Filter for query metrics. All fields are optional; bounds are inclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryFilter {
    /// Substring of the collection name
    pub collection: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
}

impl QueryFilter {
    pub(crate) fn matches(&self, query: &QueryMetric) -> bool {
        self.collection
            .as_deref()
            .map_or(true, |collection| query.collection.contains(collection))
            && in_range(query.timestamp, self.since, self.until)
    }
}

fn in_range(timestamp: i64, since: Option<i64>, until: Option<i64>) -> bool {
    since.map_or(true, |s| timestamp >= s) && until.map_or(true, |u| timestamp <= u)
}

// == Errors ==
/// Per-type error accounting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorStat {
    pub error_type: String,
    /// Errors since the last alert or prune
    pub count: u32,
    /// Errors since the service started
    pub total: u64,
    pub last_message: String,
    /// Epoch milliseconds
    pub last_seen: i64,
}

/// Payload handed to critical error callbacks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorAlert {
    pub error_type: String,
    pub count: u32,
    pub threshold: u32,
    pub last_message: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_filter() {
        let sample = MetricSample::at("db.offers.find", 12.0, Tags::new(), 1_000);

        assert!(MetricFilter::default().matches(&sample));
        assert!(MetricFilter {
            name: Some("offers".to_string()),
            since: Some(1_000),
            until: Some(1_000),
        }
        .matches(&sample));
        assert!(!MetricFilter {
            name: Some("users".to_string()),
            ..Default::default()
        }
        .matches(&sample));
        assert!(!MetricFilter {
            since: Some(1_001),
            ..Default::default()
        }
        .matches(&sample));
    }

    #[test]
    fn test_query_metric_name_and_serialization() {
        let query = QueryMetric::new("q-1", "find", "study_offers", 8.5, QueryStatus::Error)
            .with_error("boom")
            .with_timestamp(42);

        assert_eq!(query.metric_name(), "db.study_offers.find");

        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
        assert!(json.get("filters").is_none());
    }

    #[test]
    fn test_tags_helper() {
        let t = tags(&[("circuit", "db"), ("state", "OPEN")]);
        assert_eq!(t.get("circuit").map(String::as_str), Some("db"));
        assert_eq!(t.len(), 2);
    }
}
