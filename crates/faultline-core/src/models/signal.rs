//! Raw signal shapes returned by the upstream aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A single metric sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Aggregated log information for one severity bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogAggregate {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Case-insensitive; `"error"` is privileged by the extractor.
    pub severity: String,
    pub count: u64,
}

/// Essential fields of a trace span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSpan {
    pub trace_id: String,
    pub span_id: String,
    pub service: String,
    pub operation: String,
    pub duration: Duration,
    /// The value `"error"` is privileged by the extractor.
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// A directed dependency edge between two services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceGraphEdge {
    pub source: String,
    pub target: String,
    pub call_rate: f64,
    /// Fraction in `[0, 1]`.
    pub error_rate: f64,
}

impl ServiceGraphEdge {
    /// True when the edge touches `service` on either end (case-insensitive).
    pub fn touches(&self, service: &str) -> bool {
        self.source.eq_ignore_ascii_case(service) || self.target.eq_ignore_ascii_case(service)
    }
}
