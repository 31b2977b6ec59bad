//! HTTP adapter for the vector/record store.
//!
//! Reads go through a GraphQL-like endpoint (`POST /v1/graphql`) with
//! textually constructed tenant/service/time filters; writes go through
//! `POST /v1/objects`. Similarity and pattern reads are cache-fronted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use faultline_core::cache::{CacheProvider, NoopCache};
use faultline_core::models::{
    AnchorTemplate, CorrelationResult, FailurePattern, Feedback, ListCorrelationsRequest,
    ListCorrelationsResponse, RedAnchor, Severity, SignalKind, TimelineEvent,
};
use faultline_core::{Error, Result};

use crate::HistoryStore;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

/// Construction parameters for [`VectorStore`].
#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    /// Store base URL; empty degrades reads to synthetic and writes to no-ops.
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    /// TTL for cached similarity reads; zero disables that cache.
    pub similar_ttl: Duration,
    /// TTL for cached pattern reads; zero disables that cache.
    pub patterns_ttl: Duration,
}

/// Vector-store-backed implementation of [`HistoryStore`].
pub struct VectorStore {
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
    cache: Arc<dyn CacheProvider>,
    similar_ttl: Duration,
    patterns_ttl: Duration,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl VectorStore {
    pub fn new(config: VectorStoreConfig) -> Result<Self> {
        Self::with_cache(config, Arc::new(NoopCache))
    }

    /// Builds a store whose similarity and pattern reads go through `cache`.
    pub fn with_cache(config: VectorStoreConfig, cache: Arc<dyn CacheProvider>) -> Result<Self> {
        let timeout = if config.timeout.is_zero() {
            Duration::from_secs(5)
        } else {
            config.timeout
        };
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::store_unreachable("vector_store", e))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            http,
            cache,
            similar_ttl: config.similar_ttl,
            patterns_ttl: config.patterns_ttl,
        })
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.post(format!("{}{}", self.endpoint, path));
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        builder
    }

    /// Writes one object; non-2xx bodies bubble up as rejections.
    async fn put_object(&self, op: &'static str, payload: serde_json::Value) -> Result<()> {
        let response = self
            .request("/v1/objects")
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::store_unreachable(op, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::store_rejected(
                op,
                format!("{status}: {}", body.trim()),
            ));
        }
        Ok(())
    }

    fn similar_cache_key(tenant_id: &str, symptoms: &[String], limit: usize) -> String {
        // Symptom permutations must hit the same entry.
        let mut sorted: Vec<&str> = symptoms.iter().map(String::as_str).collect();
        sorted.sort_unstable();
        format!("store:similar:{tenant_id}:{limit}:{}", sorted.join("|"))
    }

    fn patterns_cache_key(tenant_id: &str, service: Option<&str>) -> String {
        format!("store:patterns:{tenant_id}:{}", service.unwrap_or_default())
    }
}

#[async_trait]
impl HistoryStore for VectorStore {
    #[instrument(skip(self, symptoms), fields(tenant = tenant_id))]
    async fn similar_incidents(
        &self,
        tenant_id: &str,
        symptoms: &[String],
        limit: usize,
    ) -> Result<Vec<CorrelationResult>> {
        if self.endpoint.is_empty() {
            return Ok(synthetic_similar_incidents(symptoms, limit));
        }

        let cache_key = Self::similar_cache_key(tenant_id, symptoms, limit);
        if !self.similar_ttl.is_zero() {
            if let Ok(data) = self.cache.get(&cache_key).await {
                if let Ok(cached) = serde_json::from_slice::<Vec<CorrelationResult>>(&data) {
                    debug!(key = %cache_key, "similarity cache hit");
                    return Ok(cached);
                }
            }
        }

        let query = json!({
            "query": format!(
                "{{\n  Get {{\n    CorrelationRecord(\n      limit: {limit}\n      where: {{\n        operator: And\n        operands: [\n          {{path: [\"tenantId\"], operator: Equal, valueString: \"{tenant_id}\"}}\n        ]\n      }}\n    ) {{\n      correlationId\n      incidentId\n      rootCause\n      confidence\n      affectedServices\n      recommendations\n      createdAt\n    }}\n  }}\n}}"
            ),
        });

        let response = match self.request("/v1/graphql").json(&query).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "similarity query rejected, using synthetic results");
                return Ok(synthetic_similar_incidents(symptoms, limit));
            }
            Err(err) => {
                warn!(error = %err, "similarity query failed, using synthetic results");
                return Ok(synthetic_similar_incidents(symptoms, limit));
            }
        };

        let decoded: SimilarResponse = match response.json().await {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(error = %err, "similarity response undecodable, using synthetic results");
                return Ok(synthetic_similar_incidents(symptoms, limit));
            }
        };

        let results: Vec<CorrelationResult> = decoded
            .data
            .get
            .records
            .into_iter()
            .map(WireCorrelationSummary::into_model)
            .collect();

        if !self.similar_ttl.is_zero() && !results.is_empty() {
            if let Ok(payload) = serde_json::to_vec(&results) {
                if let Err(err) = self.cache.set(&cache_key, &payload, self.similar_ttl).await {
                    warn!(error = %err, "similarity cache write failed");
                }
            }
        }

        Ok(results)
    }

    #[instrument(skip(self, req), fields(tenant = %req.tenant_id))]
    async fn list_correlations(
        &self,
        req: &ListCorrelationsRequest,
    ) -> Result<ListCorrelationsResponse> {
        const OP: &str = "list_correlations";

        if self.endpoint.is_empty() {
            return Ok(synthetic_correlation_list(req));
        }

        let limit = clamp_page_size(req.page_size);
        let offset = decode_page_token(&req.page_token);
        let where_clause = build_correlation_where(req);

        let query = json!({
            "query": format!(
                "{{\n  Get {{\n    CorrelationRecord(\n      limit: {limit}\n      offset: {offset}\n      {where_clause}\n      sort: [{{path: \"createdAt\", order: desc}}]\n    ) {{\n      correlationId\n      incidentId\n      rootCause\n      confidence\n      affectedServices\n      recommendations\n      createdAt\n      redAnchors {{\n        service\n        selector\n        dataType\n        timestamp\n        anomalyScore\n        threshold\n      }}\n      timeline {{\n        time\n        event\n        service\n        severity\n        anomalyScore\n        dataSource\n      }}\n    }}\n  }}\n}}"
            ),
        });

        let response = self
            .request("/v1/graphql")
            .json(&query)
            .send()
            .await
            .map_err(|e| Error::store_unreachable(OP, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::store_rejected(OP, format!("{status}")));
        }

        let decoded: ListResponse = response
            .json()
            .await
            .map_err(|e| Error::store_rejected(OP, format!("unparseable response: {e}")))?;

        let correlations: Vec<CorrelationResult> = decoded
            .data
            .get
            .records
            .into_iter()
            .map(WireCorrelationRecord::into_model)
            .collect();

        let next_page_token = if correlations.len() == limit as usize {
            (offset + correlations.len() as u64).to_string()
        } else {
            String::new()
        };

        Ok(ListCorrelationsResponse {
            correlations,
            next_page_token,
        })
    }

    #[instrument(skip(self), fields(tenant = tenant_id, service))]
    async fn fetch_patterns(
        &self,
        tenant_id: &str,
        service: Option<&str>,
    ) -> Result<Vec<FailurePattern>> {
        if self.endpoint.is_empty() {
            return Ok(synthetic_patterns(service));
        }

        let cache_key = Self::patterns_cache_key(tenant_id, service);
        if !self.patterns_ttl.is_zero() {
            if let Ok(data) = self.cache.get(&cache_key).await {
                if let Ok(cached) = serde_json::from_slice::<Vec<FailurePattern>>(&data) {
                    debug!(key = %cache_key, "patterns cache hit");
                    return Ok(cached);
                }
            }
        }

        let service_operand = match service {
            Some(service) if !service.is_empty() => format!(
                ", {{path: [\"services\"], operator: ContainsAny, valueString: \"{service}\"}}"
            ),
            _ => String::new(),
        };

        let query = json!({
            "query": format!(
                "{{\n  Get {{\n    FailurePattern(\n      where: {{\n        operator: And\n        operands: [\n          {{path: [\"tenantId\"], operator: Equal, valueString: \"{tenant_id}\"}}{service_operand}\n        ]\n      }}\n    ) {{\n      patternId\n      name\n      description\n      services\n      anchorTemplates {{\n        service\n        signalType\n        selector\n        typicalLeadLag\n        thresholds\n      }}\n      prevalence\n      lastSeen\n      quality {{\n        precision\n        recall\n      }}\n    }}\n  }}\n}}"
            ),
        });

        let response = match self.request("/v1/graphql").json(&query).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(status = %response.status(), "pattern query rejected, using synthetic results");
                return Ok(synthetic_patterns(service));
            }
            Err(err) => {
                warn!(error = %err, "pattern query failed, using synthetic results");
                return Ok(synthetic_patterns(service));
            }
        };

        let decoded: PatternsResponse = match response.json().await {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(error = %err, "pattern response undecodable, using synthetic results");
                return Ok(synthetic_patterns(service));
            }
        };

        let patterns: Vec<FailurePattern> = decoded
            .data
            .get
            .records
            .into_iter()
            .map(WirePattern::into_model)
            .collect();

        if !self.patterns_ttl.is_zero() && !patterns.is_empty() {
            if let Ok(payload) = serde_json::to_vec(&patterns) {
                if let Err(err) = self.cache.set(&cache_key, &payload, self.patterns_ttl).await {
                    warn!(error = %err, "patterns cache write failed");
                }
            }
        }

        Ok(patterns)
    }

    #[instrument(skip(self, patterns), fields(tenant = tenant_id, count = patterns.len()))]
    async fn store_patterns(&self, tenant_id: &str, patterns: &[FailurePattern]) -> Result<()> {
        if self.endpoint.is_empty() {
            return Ok(());
        }

        for pattern in patterns {
            let mut payload = json!({
                "class": "FailurePattern",
                "tenant": tenant_id,
                "properties": pattern_properties(tenant_id, pattern),
            });
            if !pattern.id.is_empty() {
                payload["id"] = json!(pattern.id);
            }
            self.put_object("store_patterns", payload).await?;
        }
        Ok(())
    }

    #[instrument(skip(self, feedback), fields(correlation = %feedback.correlation_id))]
    async fn store_feedback(&self, feedback: &Feedback) -> Result<()> {
        if self.endpoint.is_empty() {
            return Ok(());
        }

        let payload = json!({
            "class": "CorrelationFeedback",
            "tenant": feedback.tenant_id,
            "properties": feedback_properties(feedback),
        });
        self.put_object("store_feedback", payload).await
    }

    #[instrument(skip(self, correlation), fields(tenant = tenant_id, correlation = %correlation.correlation_id))]
    async fn store_correlation(
        &self,
        tenant_id: &str,
        correlation: &CorrelationResult,
    ) -> Result<()> {
        if self.endpoint.is_empty() {
            return Ok(());
        }

        let mut payload = json!({
            "class": "CorrelationRecord",
            "properties": correlation_properties(tenant_id, correlation),
        });
        if !correlation.correlation_id.is_empty() {
            payload["id"] = json!(correlation.correlation_id);
        }
        if !tenant_id.is_empty() {
            payload["tenant"] = json!(tenant_id);
        }
        self.put_object("store_correlation", payload).await
    }
}

fn clamp_page_size(page_size: u32) -> u32 {
    if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size.min(MAX_PAGE_SIZE)
    }
}

fn decode_page_token(token: &str) -> u64 {
    token.parse().unwrap_or(0)
}

fn build_correlation_where(req: &ListCorrelationsRequest) -> String {
    let mut filters = vec![format!(
        "{{path: [\"tenantId\"], operator: Equal, valueString: \"{}\"}}",
        req.tenant_id
    )];
    if let Some(service) = req.service.as_deref().filter(|s| !s.is_empty()) {
        filters.push(format!(
            "{{path: [\"affectedServices\"], operator: ContainsAny, valueString: \"{service}\"}}"
        ));
    }
    if let Some(start) = req.start {
        filters.push(format!(
            "{{path: [\"createdAt\"], operator: GreaterThanEqual, valueDate: \"{}\"}}",
            start.to_rfc3339()
        ));
    }
    if let Some(end) = req.end {
        filters.push(format!(
            "{{path: [\"createdAt\"], operator: LessThanEqual, valueDate: \"{}\"}}",
            end.to_rfc3339()
        ));
    }
    format!(
        "where: {{ operator: And, operands: [{}] }}",
        filters.join(",")
    )
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct SimilarResponse {
    #[serde(default)]
    data: SimilarData,
}

#[derive(Debug, Default, Deserialize)]
struct SimilarData {
    #[serde(rename = "Get", default)]
    get: SimilarGet,
}

#[derive(Debug, Default, Deserialize)]
struct SimilarGet {
    #[serde(rename = "CorrelationRecord", default)]
    records: Vec<WireCorrelationSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCorrelationSummary {
    #[serde(default)]
    correlation_id: String,
    #[serde(default)]
    incident_id: String,
    #[serde(default)]
    root_cause: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    affected_services: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl WireCorrelationSummary {
    fn into_model(self) -> CorrelationResult {
        CorrelationResult {
            correlation_id: self.correlation_id,
            incident_id: self.incident_id,
            root_cause: self.root_cause,
            confidence: self.confidence,
            affected_services: self.affected_services,
            red_anchors: Vec::new(),
            timeline: Vec::new(),
            recommendations: self.recommendations,
            created_at: self.created_at.unwrap_or(DateTime::UNIX_EPOCH),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListResponse {
    #[serde(default)]
    data: ListData,
}

#[derive(Debug, Default, Deserialize)]
struct ListData {
    #[serde(rename = "Get", default)]
    get: ListGet,
}

#[derive(Debug, Default, Deserialize)]
struct ListGet {
    #[serde(rename = "CorrelationRecord", default)]
    records: Vec<WireCorrelationRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCorrelationRecord {
    #[serde(flatten)]
    summary: WireCorrelationSummary,
    #[serde(default)]
    red_anchors: Vec<WireAnchor>,
    #[serde(default)]
    timeline: Vec<WireTimelineEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAnchor {
    #[serde(default)]
    service: String,
    #[serde(default)]
    selector: String,
    #[serde(default)]
    data_type: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    anomaly_score: f64,
    #[serde(default)]
    threshold: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTimelineEvent {
    #[serde(default)]
    time: Option<DateTime<Utc>>,
    #[serde(default)]
    event: String,
    #[serde(default)]
    service: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    anomaly_score: f64,
    #[serde(default)]
    data_source: String,
}

impl WireCorrelationRecord {
    fn into_model(self) -> CorrelationResult {
        let mut result = self.summary.into_model();
        result.red_anchors = self
            .red_anchors
            .into_iter()
            .map(|a| RedAnchor {
                service: a.service,
                selector: a.selector,
                kind: SignalKind::parse(&a.data_type),
                timestamp: a.timestamp.unwrap_or(DateTime::UNIX_EPOCH),
                anomaly_score: a.anomaly_score,
                threshold: a.threshold,
            })
            .collect();
        result.timeline = self
            .timeline
            .into_iter()
            .map(|e| TimelineEvent {
                time: e.time.unwrap_or(DateTime::UNIX_EPOCH),
                event: e.event,
                service: e.service,
                severity: Severity::parse(&e.severity),
                anomaly_score: e.anomaly_score,
                data_source: SignalKind::parse(&e.data_source),
            })
            .collect();
        result
    }
}

#[derive(Debug, Default, Deserialize)]
struct PatternsResponse {
    #[serde(default)]
    data: PatternsData,
}

#[derive(Debug, Default, Deserialize)]
struct PatternsData {
    #[serde(rename = "Get", default)]
    get: PatternsGet,
}

#[derive(Debug, Default, Deserialize)]
struct PatternsGet {
    #[serde(rename = "FailurePattern", default)]
    records: Vec<WirePattern>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePattern {
    #[serde(default)]
    pattern_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    anchor_templates: Vec<WireAnchorTemplate>,
    #[serde(default)]
    prevalence: f64,
    #[serde(default)]
    last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    quality: WireQuality,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAnchorTemplate {
    #[serde(default)]
    service: String,
    #[serde(default)]
    signal_type: String,
    #[serde(default)]
    selector: String,
    #[serde(default)]
    typical_lead_lag: f64,
    #[serde(default)]
    thresholds: f64,
}

#[derive(Debug, Default, Deserialize)]
struct WireQuality {
    #[serde(default)]
    precision: f64,
    #[serde(default)]
    recall: f64,
}

impl WirePattern {
    fn into_model(self) -> FailurePattern {
        FailurePattern {
            id: self.pattern_id,
            name: self.name,
            description: self.description,
            services: self.services,
            anchor_templates: self
                .anchor_templates
                .into_iter()
                .map(|t| AnchorTemplate {
                    service: t.service,
                    signal_type: t.signal_type,
                    selector: t.selector,
                    typical_lag: t.typical_lead_lag,
                    threshold: t.thresholds,
                })
                .collect(),
            prevalence: self.prevalence,
            last_seen: self.last_seen.unwrap_or(DateTime::UNIX_EPOCH),
            precision: self.quality.precision,
            recall: self.quality.recall,
        }
    }
}

// ---------------------------------------------------------------------------
// Write-path properties
// ---------------------------------------------------------------------------

fn pattern_properties(tenant_id: &str, pattern: &FailurePattern) -> serde_json::Value {
    let anchors: Vec<serde_json::Value> = pattern
        .anchor_templates
        .iter()
        .map(|anchor| {
            json!({
                "service": anchor.service,
                "signalType": anchor.signal_type,
                "selector": anchor.selector,
                "typicalLeadLag": anchor.typical_lag,
                "threshold": anchor.threshold,
            })
        })
        .collect();

    json!({
        "patternId": pattern.id,
        "tenantId": tenant_id,
        "name": pattern.name,
        "description": pattern.description,
        "services": pattern.services,
        "prevalence": pattern.prevalence,
        "lastSeen": pattern.last_seen.to_rfc3339(),
        "anchorTemplates": anchors,
        "quality": {
            "precision": pattern.precision,
            "recall": pattern.recall,
        },
    })
}

fn feedback_properties(feedback: &Feedback) -> serde_json::Value {
    json!({
        "tenantId": feedback.tenant_id,
        "correlationId": feedback.correlation_id,
        "correct": feedback.correct,
        "notes": feedback.notes,
        "submittedAt": feedback.submitted_at.to_rfc3339(),
    })
}

fn correlation_properties(tenant_id: &str, correlation: &CorrelationResult) -> serde_json::Value {
    let anchors: Vec<serde_json::Value> = correlation
        .red_anchors
        .iter()
        .map(|anchor| {
            json!({
                "service": anchor.service,
                "selector": anchor.selector,
                "dataType": anchor.kind.as_str(),
                "timestamp": anchor.timestamp.to_rfc3339(),
                "anomalyScore": anchor.anomaly_score,
                "threshold": anchor.threshold,
            })
        })
        .collect();

    let timeline: Vec<serde_json::Value> = correlation
        .timeline
        .iter()
        .map(|event| {
            json!({
                "time": event.time.to_rfc3339(),
                "event": event.event,
                "service": event.service,
                "severity": event.severity.as_str(),
                "anomalyScore": event.anomaly_score,
                "dataSource": event.data_source.as_str(),
            })
        })
        .collect();

    json!({
        "correlationId": correlation.correlation_id,
        "incidentId": correlation.incident_id,
        "tenantId": tenant_id,
        "rootCause": correlation.root_cause,
        "confidence": correlation.confidence,
        "affectedServices": correlation.affected_services,
        "recommendations": correlation.recommendations,
        "createdAt": correlation.created_at.to_rfc3339(),
        "redAnchors": anchors,
        "timeline": timeline,
    })
}

// ---------------------------------------------------------------------------
// Synthetic fallbacks
// ---------------------------------------------------------------------------

fn synthetic_similar_incidents(symptoms: &[String], limit: usize) -> Vec<CorrelationResult> {
    let limit = if limit == 0 { 3 } else { limit };
    let now = Utc::now();
    let mut results: Vec<CorrelationResult> = (0..limit)
        .map(|i| CorrelationResult {
            correlation_id: format!("synthetic-{}", i + 1),
            incident_id: format!("incident-{}", i + 1),
            root_cause: "synthetic-service".into(),
            confidence: 0.55 + i as f64 * 0.05,
            affected_services: vec!["synthetic-service".into()],
            red_anchors: Vec::new(),
            timeline: Vec::new(),
            recommendations: vec![
                "Check downstream dependencies".into(),
                "Review recent deploy".into(),
            ],
            created_at: now - chrono::Duration::hours(i as i64),
        })
        .collect();

    if let Some(symptom) = symptoms.first() {
        results[0]
            .recommendations
            .push(format!("Symptom hint: {symptom}"));
    }
    results
}

fn synthetic_correlation_list(req: &ListCorrelationsRequest) -> ListCorrelationsResponse {
    let service = req
        .service
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or("synthetic-service");
    let now = Utc::now();

    ListCorrelationsResponse {
        correlations: vec![CorrelationResult {
            correlation_id: "synthetic-corr-1".into(),
            incident_id: "synthetic-incident-1".into(),
            root_cause: format!("{service}: cpu usage anomaly"),
            confidence: 0.65,
            affected_services: vec![service.to_string()],
            red_anchors: vec![RedAnchor {
                service: service.to_string(),
                selector: "metrics:cpu_usage".into(),
                kind: SignalKind::Metrics,
                timestamp: now - chrono::Duration::minutes(70),
                anomaly_score: 3.2,
                threshold: 2.0,
            }],
            timeline: vec![TimelineEvent {
                time: now - chrono::Duration::minutes(75),
                event: "Metric anomaly detected".into(),
                service: service.to_string(),
                severity: Severity::High,
                anomaly_score: 3.2,
                data_source: SignalKind::Metrics,
            }],
            recommendations: vec!["Scale service".into(), "Review upstream errors".into()],
            created_at: now - chrono::Duration::hours(1),
        }],
        next_page_token: String::new(),
    }
}

fn synthetic_patterns(service: Option<&str>) -> Vec<FailurePattern> {
    let service = service.filter(|s| !s.is_empty()).unwrap_or("synthetic-service");
    vec![FailurePattern {
        id: "pattern-1".into(),
        name: "CPU saturation".into(),
        description: "Sudden CPU saturation followed by error spikes".into(),
        services: vec![service.to_string()],
        anchor_templates: vec![
            AnchorTemplate {
                service: service.to_string(),
                signal_type: "metrics".into(),
                selector: "cpu_usage".into(),
                typical_lag: 1.0,
                threshold: 0.8,
            },
            AnchorTemplate {
                service: service.to_string(),
                signal_type: "logs".into(),
                selector: "error".into(),
                typical_lag: 2.0,
                threshold: 10.0,
            },
        ],
        prevalence: 0.32,
        last_seen: Utc::now() - chrono::Duration::hours(24),
        precision: 0.68,
        recall: 0.44,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_core::cache::MemoryCache;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_config(endpoint: String) -> VectorStoreConfig {
        VectorStoreConfig {
            endpoint,
            api_key: "test-key".into(),
            timeout: Duration::from_secs(2),
            similar_ttl: Duration::ZERO,
            patterns_ttl: Duration::ZERO,
        }
    }

    fn graphql_correlations(records: serde_json::Value) -> serde_json::Value {
        serde_json::json!({"data": {"Get": {"CorrelationRecord": records}}})
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(clamp_page_size(0), 20);
        assert_eq!(clamp_page_size(1), 1);
        assert_eq!(clamp_page_size(100), 100);
        assert_eq!(clamp_page_size(250), 100);
    }

    #[test]
    fn page_tokens_decode_leniently() {
        assert_eq!(decode_page_token(""), 0);
        assert_eq!(decode_page_token("40"), 40);
        assert_eq!(decode_page_token("not-a-number"), 0);
        assert_eq!(decode_page_token("-3"), 0);
    }

    #[test]
    fn similarity_cache_key_canonicalises_symptom_order() {
        let a = VectorStore::similar_cache_key("t", &["a".into(), "b".into()], 2);
        let b = VectorStore::similar_cache_key("t", &["b".into(), "a".into()], 2);
        assert_eq!(a, b);

        let other_limit = VectorStore::similar_cache_key("t", &["a".into(), "b".into()], 3);
        assert_ne!(a, other_limit);
    }

    #[test]
    fn where_clause_and_combines_filters() {
        let req = ListCorrelationsRequest {
            tenant_id: "acme".into(),
            service: Some("checkout".into()),
            start: Some("2025-06-01T00:00:00Z".parse().unwrap()),
            end: None,
            ..Default::default()
        };
        let clause = build_correlation_where(&req);
        assert!(clause.contains("tenantId"));
        assert!(clause.contains("checkout"));
        assert!(clause.contains("GreaterThanEqual"));
        assert!(!clause.contains("LessThanEqual"));
    }

    #[tokio::test]
    async fn similarity_permutations_hit_one_upstream_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(graphql_correlations(
                serde_json::json!([{
                    "correlationId": "corr-1",
                    "incidentId": "inc-1",
                    "rootCause": "checkout: metrics:cpu_usage anomaly",
                    "confidence": 0.8,
                    "affectedServices": ["checkout"],
                    "recommendations": ["Roll back"],
                    "createdAt": "2025-06-01T10:00:00Z"
                }]),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = store_config(server.uri());
        cfg.similar_ttl = Duration::from_secs(120);
        let store = VectorStore::with_cache(cfg, Arc::new(MemoryCache::new())).unwrap();

        let first = store
            .similar_incidents("t", &["a".into(), "b".into()], 2)
            .await
            .unwrap();
        let second = store
            .similar_incidents("t", &["b".into(), "a".into()], 2)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].correlation_id, "corr-1");
    }

    #[tokio::test]
    async fn similarity_degrades_to_synthetic_on_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = VectorStore::new(store_config(server.uri())).unwrap();
        let results = store
            .similar_incidents("t", &["latency".into()], 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].correlation_id.starts_with("synthetic-"));
        assert!(results[0]
            .recommendations
            .iter()
            .any(|r| r.contains("latency")));
    }

    #[tokio::test]
    async fn unconfigured_store_synthesizes_similarity() {
        let store = VectorStore::new(store_config(String::new())).unwrap();
        let results = store.similar_incidents("t", &[], 0).await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.correlation_id.starts_with("synthetic-")));
    }

    #[tokio::test]
    async fn full_page_produces_next_token() {
        let server = MockServer::start().await;
        let records: Vec<serde_json::Value> = (0..2)
            .map(|i| {
                serde_json::json!({
                    "correlationId": format!("corr-{i}"),
                    "incidentId": format!("inc-{i}"),
                    "rootCause": "svc: anomaly",
                    "confidence": 0.5,
                    "affectedServices": ["svc"],
                    "recommendations": [],
                    "createdAt": "2025-06-01T10:00:00Z",
                    "redAnchors": [],
                    "timeline": []
                })
            })
            .collect();
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(graphql_correlations(serde_json::json!(records))),
            )
            .mount(&server)
            .await;

        let store = VectorStore::new(store_config(server.uri())).unwrap();
        let req = ListCorrelationsRequest {
            tenant_id: "acme".into(),
            page_size: 2,
            page_token: "4".into(),
            ..Default::default()
        };
        let resp = store.list_correlations(&req).await.unwrap();
        assert_eq!(resp.correlations.len(), 2);
        assert_eq!(resp.next_page_token, "6");
    }

    #[tokio::test]
    async fn unfilled_page_has_no_next_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(graphql_correlations(
                serde_json::json!([{
                    "correlationId": "corr-1",
                    "incidentId": "inc-1",
                    "rootCause": "svc: anomaly",
                    "confidence": 0.5,
                    "affectedServices": ["svc"],
                    "recommendations": [],
                    "createdAt": "2025-06-01T10:00:00Z",
                    "redAnchors": [],
                    "timeline": []
                }]),
            )))
            .mount(&server)
            .await;

        let store = VectorStore::new(store_config(server.uri())).unwrap();
        let req = ListCorrelationsRequest {
            tenant_id: "acme".into(),
            page_size: 20,
            ..Default::default()
        };
        let resp = store.list_correlations(&req).await.unwrap();
        assert_eq!(resp.correlations.len(), 1);
        assert!(resp.next_page_token.is_empty());
    }

    #[tokio::test]
    async fn list_surfaces_store_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = VectorStore::new(store_config(server.uri())).unwrap();
        let req = ListCorrelationsRequest {
            tenant_id: "acme".into(),
            ..Default::default()
        };
        let err = store.list_correlations(&req).await.unwrap_err();
        assert!(err.to_string().contains("list_correlations"));
    }

    #[tokio::test]
    async fn feedback_write_posts_one_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/objects"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = VectorStore::new(store_config(server.uri())).unwrap();
        let feedback = Feedback {
            tenant_id: "acme".into(),
            correlation_id: "corr-9".into(),
            correct: true,
            notes: "matched the postmortem".into(),
            submitted_at: Utc::now(),
        };
        store.store_feedback(&feedback).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_write_bubbles_up() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/objects"))
            .respond_with(ResponseTemplate::new(422).set_body_string("schema mismatch"))
            .mount(&server)
            .await;

        let store = VectorStore::new(store_config(server.uri())).unwrap();
        let err = store
            .store_correlation("acme", &CorrelationResult::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("store_correlation"));
    }

    #[tokio::test]
    async fn writes_without_endpoint_are_silent_noops() {
        let store = VectorStore::new(store_config(String::new())).unwrap();
        store
            .store_correlation("acme", &CorrelationResult::default())
            .await
            .unwrap();
        store.store_patterns("acme", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn patterns_decode_quality_and_templates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"Get": {"FailurePattern": [{
                    "patternId": "pattern-checkout",
                    "name": "checkout hotspot",
                    "description": "Auto-mined",
                    "services": ["checkout"],
                    "anchorTemplates": [{
                        "service": "checkout",
                        "signalType": "metrics",
                        "selector": "metrics:cpu_usage",
                        "typicalLeadLag": 1.0,
                        "thresholds": 3.1
                    }],
                    "prevalence": 0.4,
                    "lastSeen": "2025-06-01T09:00:00Z",
                    "quality": {"precision": 0.7, "recall": 0.6}
                }]}}
            })))
            .mount(&server)
            .await;

        let store = VectorStore::new(store_config(server.uri())).unwrap();
        let patterns = store.fetch_patterns("acme", Some("checkout")).await.unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].id, "pattern-checkout");
        assert_eq!(patterns[0].anchor_templates[0].threshold, 3.1);
        assert_eq!(patterns[0].precision, 0.7);
    }
}
