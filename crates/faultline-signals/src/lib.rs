//! # Faultline Signals
//!
//! Client for the upstream signal aggregator: metric series, log
//! aggregates, trace spans and the service-dependency graph for a
//! `(tenant, service, window)` triple.
//!
//! An empty response from any operation is a hard failure of that
//! operation; the client never fabricates data. Service-graph fetches can
//! be fronted by a byte cache with a configurable TTL.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

mod aggregator;

pub use aggregator::{AggregatorClient, AggregatorClientConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use faultline_core::models::{LogAggregate, MetricSample, ServiceGraphEdge, TraceSpan};
use faultline_core::Result;

/// Upstream signal operations used by the investigation pipeline.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Ordered metric samples for the window.
    async fn fetch_metric_series(
        &self,
        tenant_id: &str,
        service: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>>;

    /// Ordered log aggregates for the window.
    async fn fetch_log_entries(
        &self,
        tenant_id: &str,
        service: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogAggregate>>;

    /// Trace spans for the window.
    async fn fetch_trace_spans(
        &self,
        tenant_id: &str,
        service: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TraceSpan>>;

    /// Directed service-dependency edges for the window.
    async fn fetch_service_graph(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ServiceGraphEdge>>;
}
