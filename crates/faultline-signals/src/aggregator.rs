//! HTTP JSON client for the signal aggregator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use faultline_core::cache::{CacheProvider, NoopCache};
use faultline_core::models::{LogAggregate, MetricSample, ServiceGraphEdge, TraceSpan};
use faultline_core::{Error, Result};

use crate::SignalSource;

/// Construction parameters for [`AggregatorClient`].
#[derive(Debug, Clone)]
pub struct AggregatorClientConfig {
    pub base_url: String,
    pub metrics_path: String,
    pub logs_path: String,
    pub traces_path: String,
    pub service_graph_path: String,
    pub timeout: Duration,
    /// TTL for cached service-graph responses; zero disables caching.
    pub service_graph_ttl: Duration,
}

/// Client for the upstream aggregator's four signal endpoints.
///
/// Service-graph responses are cached (non-empty results only); every
/// cache failure other than a miss is logged and the call proceeds to the
/// upstream.
pub struct AggregatorClient {
    base_url: String,
    metrics_path: String,
    logs_path: String,
    traces_path: String,
    service_graph_path: String,
    http: reqwest::Client,
    cache: Arc<dyn CacheProvider>,
    service_graph_ttl: Duration,
}

impl std::fmt::Debug for AggregatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregatorClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SeriesEnvelope {
    #[serde(default)]
    series: Vec<WireSample>,
}

#[derive(Debug, Deserialize)]
struct WireSample {
    timestamp: DateTime<Utc>,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct EntriesEnvelope {
    #[serde(default)]
    entries: Vec<WireEntry>,
}

#[derive(Debug, Deserialize)]
struct WireEntry {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
struct SpansEnvelope {
    #[serde(default)]
    spans: Vec<WireSpan>,
}

#[derive(Debug, Deserialize)]
struct WireSpan {
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    span_id: String,
    #[serde(default)]
    service: String,
    #[serde(default)]
    operation: String,
    #[serde(default)]
    duration_ms: f64,
    #[serde(default)]
    status: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize)]
struct EdgesEnvelope {
    #[serde(default)]
    edges: Vec<ServiceGraphEdge>,
}

impl AggregatorClient {
    pub fn new(config: AggregatorClientConfig) -> Result<Self> {
        Self::with_cache(config, Arc::new(NoopCache))
    }

    /// Builds a client whose service-graph fetches go through `cache`.
    pub fn with_cache(
        config: AggregatorClientConfig,
        cache: Arc<dyn CacheProvider>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::upstream("aggregator_client", e))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            metrics_path: config.metrics_path,
            logs_path: config.logs_path,
            traces_path: config.traces_path,
            service_graph_path: config.service_graph_path,
            http,
            cache,
            service_graph_ttl: config.service_graph_ttl,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POSTs the window envelope and decodes the JSON body.
    async fn post_window<T>(
        &self,
        op: &'static str,
        path: &str,
        tenant_id: &str,
        service: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if self.base_url.is_empty() {
            return Err(Error::not_configured(op, "aggregator base URL"));
        }

        let mut payload = json!({
            "tenant_id": tenant_id,
            "start": start.to_rfc3339(),
            "end": end.to_rfc3339(),
        });
        if let Some(service) = service {
            payload["service"] = json!(service);
        }

        let response = self
            .http
            .post(self.url(path))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::upstream(op, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(op, format!("upstream returned {status}")));
        }

        response.json::<T>().await.map_err(|e| Error::upstream(op, e))
    }

    fn graph_cache_key(tenant_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!(
            "signals:graph:{}:{}:{}",
            tenant_id,
            start.to_rfc3339(),
            end.to_rfc3339()
        )
    }
}

#[async_trait]
impl SignalSource for AggregatorClient {
    #[instrument(skip(self), fields(tenant = tenant_id, service))]
    async fn fetch_metric_series(
        &self,
        tenant_id: &str,
        service: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSample>> {
        const OP: &str = "fetch_metrics";
        let envelope: SeriesEnvelope = self
            .post_window(OP, &self.metrics_path, tenant_id, Some(service), start, end)
            .await?;

        if envelope.series.is_empty() {
            return Err(Error::upstream_empty(OP));
        }
        Ok(envelope
            .series
            .into_iter()
            .map(|s| MetricSample {
                timestamp: s.timestamp,
                value: s.value,
            })
            .collect())
    }

    #[instrument(skip(self), fields(tenant = tenant_id, service))]
    async fn fetch_log_entries(
        &self,
        tenant_id: &str,
        service: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LogAggregate>> {
        const OP: &str = "fetch_logs";
        let envelope: EntriesEnvelope = self
            .post_window(OP, &self.logs_path, tenant_id, Some(service), start, end)
            .await?;

        if envelope.entries.is_empty() {
            return Err(Error::upstream_empty(OP));
        }
        Ok(envelope
            .entries
            .into_iter()
            .map(|e| LogAggregate {
                timestamp: e.timestamp,
                message: e.message,
                severity: e.severity,
                count: e.count,
            })
            .collect())
    }

    #[instrument(skip(self), fields(tenant = tenant_id, service))]
    async fn fetch_trace_spans(
        &self,
        tenant_id: &str,
        service: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TraceSpan>> {
        const OP: &str = "fetch_traces";
        let envelope: SpansEnvelope = self
            .post_window(OP, &self.traces_path, tenant_id, Some(service), start, end)
            .await?;

        if envelope.spans.is_empty() {
            return Err(Error::upstream_empty(OP));
        }
        Ok(envelope
            .spans
            .into_iter()
            .map(|s| TraceSpan {
                trace_id: s.trace_id,
                span_id: s.span_id,
                service: if s.service.is_empty() {
                    service.to_string()
                } else {
                    s.service
                },
                operation: s.operation,
                duration: Duration::from_secs_f64(s.duration_ms.max(0.0) / 1_000.0),
                status: s.status,
                timestamp: s.timestamp,
            })
            .collect())
    }

    #[instrument(skip(self), fields(tenant = tenant_id))]
    async fn fetch_service_graph(
        &self,
        tenant_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ServiceGraphEdge>> {
        const OP: &str = "fetch_service_graph";

        let cache_key = Self::graph_cache_key(tenant_id, start, end);
        if !self.service_graph_ttl.is_zero() {
            match self.cache.get(&cache_key).await {
                Ok(data) => {
                    if let Ok(edges) = serde_json::from_slice::<Vec<ServiceGraphEdge>>(&data) {
                        debug!(key = %cache_key, "service graph cache hit");
                        return Ok(edges);
                    }
                }
                Err(err) if err.is_miss() => {}
                Err(err) => warn!(error = %err, "service graph cache read failed"),
            }
        }

        let envelope: EdgesEnvelope = self
            .post_window(OP, &self.service_graph_path, tenant_id, None, start, end)
            .await?;

        if envelope.edges.is_empty() {
            return Err(Error::upstream_empty(OP));
        }

        if !self.service_graph_ttl.is_zero() {
            if let Ok(payload) = serde_json::to_vec(&envelope.edges) {
                if let Err(err) = self
                    .cache
                    .set(&cache_key, &payload, self.service_graph_ttl)
                    .await
                {
                    warn!(error = %err, "service graph cache write failed");
                }
            }
        }

        Ok(envelope.edges)
    }
}
