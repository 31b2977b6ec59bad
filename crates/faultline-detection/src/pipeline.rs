//! Investigation pipeline: signal orchestration, anchor/timeline
//! synthesis, confidence and causality scoring, recommendation resolution
//! and best-effort persistence.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use faultline_core::models::{
    CorrelationResult, InvestigationRequest, RedAnchor, ServiceGraphEdge, Severity, SignalKind,
    TimelineEvent,
};
use faultline_core::Result;
use faultline_signals::SignalSource;
use faultline_storage::HistoryStore;

use crate::causality::{self, first_event_time};
use crate::extractors::{logs, metrics, traces, LogAnomaly, MetricAnomaly, TraceAnomaly};
use crate::rules::RuleEngine;

const MAX_ANCHORS: usize = 5;
const MAX_TIMELINE_EVENTS: usize = 10;
const SIMILAR_INCIDENT_LIMIT: usize = 3;

/// Offset applied to synthetic causality and topology events.
fn topology_offset() -> chrono::Duration {
    chrono::Duration::milliseconds(500)
}

/// Fallback service name when the request names nothing at all.
const UNKNOWN_SERVICE: &str = "unknown-service";

fn default_recommendations() -> Vec<String> {
    vec![
        "Review recent deployments for regressions".into(),
        "Check upstream dependencies for correlated errors".into(),
    ]
}

/// Orchestrates one investigation end to end.
pub struct Pipeline {
    signals: Arc<dyn SignalSource>,
    store: Option<Arc<dyn HistoryStore>>,
    rules: RuleEngine,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("store", &self.store.is_some())
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        signals: Arc<dyn SignalSource>,
        store: Option<Arc<dyn HistoryStore>>,
        rules: RuleEngine,
    ) -> Self {
        Self {
            signals,
            store,
            rules,
        }
    }

    /// Runs the full anomaly detection and ranking flow.
    ///
    /// The service-graph fetch is tolerant (failure degrades to an empty
    /// graph); metric, log and trace fetches are strict. Persistence of the
    /// finished result is best-effort and never fails the investigation.
    #[instrument(skip(self, req), fields(incident = %req.incident_id, tenant = %req.tenant_id))]
    pub async fn investigate(&self, req: &InvestigationRequest) -> Result<CorrelationResult> {
        let service = nominal_service(req);
        let start = req.time_range.start;
        let end = req.time_range.end;

        let (graph, metric_series, log_entries, trace_spans) = tokio::join!(
            self.signals.fetch_service_graph(&req.tenant_id, start, end),
            self.signals
                .fetch_metric_series(&req.tenant_id, &service, start, end),
            self.signals
                .fetch_log_entries(&req.tenant_id, &service, start, end),
            self.signals
                .fetch_trace_spans(&req.tenant_id, &service, start, end),
        );

        let graph = graph.unwrap_or_else(|err| {
            warn!(error = %err, "service graph fetch failed, continuing with empty graph");
            Vec::new()
        });
        let metric_series = metric_series?;
        let log_entries = log_entries?;
        let trace_spans = trace_spans?;

        let metric_anomalies = metrics::detect(&metric_series, req.anomaly_threshold);
        let log_anomalies = logs::detect(&log_entries);
        let trace_anomalies = traces::detect(&trace_spans);

        let anchors = build_anchors(&service, &metric_anomalies, &log_anomalies, &trace_anomalies);
        let mut timeline = build_timeline(&metric_anomalies, &log_anomalies, &trace_anomalies);

        let base_confidence =
            compute_confidence(&metric_anomalies, &log_anomalies, &trace_anomalies);
        let mut root_cause = derive_root_cause(&service, &anchors);

        let causality = causality::evaluate(&service, &timeline, &graph);
        for note in &causality.notes {
            debug!(note, "causality note");
        }

        let recommendations = self.resolve_recommendations(req, &anchors, &timeline).await;

        let mut affected: Vec<String> = Vec::with_capacity(1 + req.affected_services.len());
        affected.push(service.clone());
        affected.extend(req.affected_services.iter().cloned());
        affected.extend(neighbor_services(&graph, &service));

        let root_time = root_event_time(&service, &timeline);

        if let Some(upstream) = causality
            .suggested_service
            .as_ref()
            .filter(|s| !s.eq_ignore_ascii_case(&service))
        {
            affected.push(upstream.clone());
            root_cause = format!("{upstream}: upstream influence on {service}");
            timeline.push(TimelineEvent {
                time: root_time - topology_offset(),
                event: format!("Causality: {upstream} precedes {service}"),
                service: upstream.clone(),
                severity: Severity::Medium,
                anomaly_score: 0.0,
                data_source: SignalKind::Traces,
            });
        }

        append_topology_events(&mut timeline, &service, &graph, root_time);
        timeline.sort_by_key(|event| event.time);
        timeline.truncate(MAX_TIMELINE_EVENTS);

        let affected = unique_services(affected);
        let confidence = calibrate_confidence(base_confidence, causality.score);

        let now = Utc::now();
        let result = CorrelationResult {
            correlation_id: format!("corr-{}", now.timestamp_nanos_opt().unwrap_or_default()),
            incident_id: req.incident_id.clone(),
            root_cause,
            confidence,
            affected_services: affected,
            red_anchors: anchors,
            timeline,
            recommendations,
            created_at: now,
        };

        if let Some(store) = &self.store {
            if let Err(err) = store.store_correlation(&req.tenant_id, &result).await {
                warn!(error = %err, "failed to persist correlation");
            }
        }

        Ok(result)
    }

    /// Similarity recall first, then rules, then the fixed default pair.
    async fn resolve_recommendations(
        &self,
        req: &InvestigationRequest,
        anchors: &[RedAnchor],
        timeline: &[TimelineEvent],
    ) -> Vec<String> {
        if let Some(store) = &self.store {
            match store
                .similar_incidents(&req.tenant_id, &req.symptoms, SIMILAR_INCIDENT_LIMIT)
                .await
            {
                Ok(results) => {
                    if let Some(first) = results.first() {
                        if !first.recommendations.is_empty() {
                            return first.recommendations.clone();
                        }
                    }
                }
                Err(err) => warn!(error = %err, "similarity recall failed"),
            }
        }

        let recs = self.rules.recommend(req, anchors, timeline);
        if recs.is_empty() {
            default_recommendations()
        } else {
            recs
        }
    }
}

fn nominal_service(req: &InvestigationRequest) -> String {
    if let Some(service) = req.affected_services.iter().find(|s| !s.is_empty()) {
        return service.clone();
    }
    match req.symptoms.first() {
        Some(symptom) if !symptom.is_empty() => symptom.clone(),
        _ => UNKNOWN_SERVICE.to_string(),
    }
}

fn build_anchors(
    service: &str,
    metric_anomalies: &[MetricAnomaly],
    log_anomalies: &[LogAnomaly],
    trace_anomalies: &[TraceAnomaly],
) -> Vec<RedAnchor> {
    let mut anchors =
        Vec::with_capacity(metric_anomalies.len() + log_anomalies.len() + trace_anomalies.len());

    for anomaly in metric_anomalies {
        anchors.push(RedAnchor {
            service: service.to_string(),
            selector: "metrics:cpu_usage".into(),
            kind: SignalKind::Metrics,
            timestamp: anomaly.timestamp,
            anomaly_score: anomaly.score,
            threshold: anomaly.threshold,
        });
    }
    for anomaly in log_anomalies {
        anchors.push(RedAnchor {
            service: service.to_string(),
            selector: format!("logs:{}", anomaly.severity),
            kind: SignalKind::Logs,
            timestamp: anomaly.timestamp,
            anomaly_score: anomaly.score,
            threshold: 3.0,
        });
    }
    for anomaly in trace_anomalies {
        anchors.push(RedAnchor {
            service: anomaly.span.service.clone(),
            selector: format!("trace:{}", anomaly.span.operation),
            kind: SignalKind::Traces,
            timestamp: anomaly.span.timestamp,
            anomaly_score: anomaly.score,
            threshold: 2.0,
        });
    }

    anchors.sort_by(|a, b| {
        b.anomaly_score
            .partial_cmp(&a.anomaly_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    anchors.truncate(MAX_ANCHORS);
    anchors
}

fn build_timeline(
    metric_anomalies: &[MetricAnomaly],
    log_anomalies: &[LogAnomaly],
    trace_anomalies: &[TraceAnomaly],
) -> Vec<TimelineEvent> {
    let mut timeline =
        Vec::with_capacity(metric_anomalies.len() + log_anomalies.len() + trace_anomalies.len());

    for anomaly in metric_anomalies {
        timeline.push(TimelineEvent {
            time: anomaly.timestamp,
            event: "Metric anomaly detected".into(),
            service: String::new(),
            severity: Severity::from_score(anomaly.score),
            anomaly_score: anomaly.score,
            data_source: SignalKind::Metrics,
        });
    }
    for anomaly in log_anomalies {
        timeline.push(TimelineEvent {
            time: anomaly.timestamp,
            event: format!("Log spike ({})", anomaly.severity),
            service: String::new(),
            severity: Severity::from_score(anomaly.score),
            anomaly_score: anomaly.score,
            data_source: SignalKind::Logs,
        });
    }
    for anomaly in trace_anomalies {
        let severity = if anomaly.is_error() {
            Severity::High
        } else {
            Severity::from_score(anomaly.score)
        };
        timeline.push(TimelineEvent {
            time: anomaly.span.timestamp,
            event: format!("Slow span: {}", anomaly.span.operation),
            service: anomaly.span.service.clone(),
            severity,
            anomaly_score: anomaly.score,
            data_source: SignalKind::Traces,
        });
    }

    // Stable sort: ties keep metric -> log -> trace insertion order.
    timeline.sort_by_key(|event| event.time);
    timeline.truncate(MAX_TIMELINE_EVENTS);
    timeline
}

fn compute_confidence(
    metric_anomalies: &[MetricAnomaly],
    log_anomalies: &[LogAnomaly],
    trace_anomalies: &[TraceAnomaly],
) -> f64 {
    let mut confidence = 0.0;

    if !metric_anomalies.is_empty() {
        let max = max_score(metric_anomalies.iter().map(|a| a.score));
        confidence += 0.25 + (max / 8.0).clamp(0.0, 0.25);
    }
    if !log_anomalies.is_empty() {
        let max = max_score(log_anomalies.iter().map(|a| a.score));
        confidence += 0.25 + (max / 6.0).clamp(0.0, 0.2);
    }
    if !trace_anomalies.is_empty() {
        let max = max_score(trace_anomalies.iter().map(|a| a.score));
        confidence += 0.25 + (max / 6.0).clamp(0.0, 0.2);
    }

    confidence.min(1.0)
}

fn max_score(scores: impl Iterator<Item = f64>) -> f64 {
    scores.fold(0.0, f64::max)
}

fn calibrate_confidence(base: f64, causality_score: f64) -> f64 {
    let base = base.clamp(0.0, 1.0);
    if causality_score <= 0.0 {
        (base * 0.7).clamp(0.0, 1.0)
    } else {
        (base * 0.6 + causality_score * 0.4).clamp(0.0, 1.0)
    }
}

fn derive_root_cause(service: &str, anchors: &[RedAnchor]) -> String {
    match anchors.first() {
        None => format!("{service}: no dominant anchor"),
        Some(anchor) => format!("{}: {} anomaly", anchor.service, anchor.selector),
    }
}

fn root_event_time(service: &str, timeline: &[TimelineEvent]) -> DateTime<Utc> {
    first_event_time(service, timeline)
        .or_else(|| timeline.first().map(|event| event.time))
        .unwrap_or_else(Utc::now)
}

fn neighbor_services(edges: &[ServiceGraphEdge], service: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut neighbors = Vec::new();
    for edge in edges {
        if edge.source.eq_ignore_ascii_case(service) && seen.insert(edge.target.clone()) {
            neighbors.push(edge.target.clone());
        }
        if edge.target.eq_ignore_ascii_case(service) && seen.insert(edge.source.clone()) {
            neighbors.push(edge.source.clone());
        }
    }
    neighbors
}

/// Annotates the timeline with up to two highest-call-rate edges touching
/// the nominal service.
fn append_topology_events(
    timeline: &mut Vec<TimelineEvent>,
    service: &str,
    edges: &[ServiceGraphEdge],
    root_time: DateTime<Utc>,
) {
    let mut related: Vec<&ServiceGraphEdge> =
        edges.iter().filter(|edge| edge.touches(service)).collect();
    if related.is_empty() {
        return;
    }
    related.sort_by(|a, b| {
        b.call_rate
            .partial_cmp(&a.call_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for edge in related.into_iter().take(2) {
        let upstream = edge.target.eq_ignore_ascii_case(service);
        let (time, event_service, mut label) = if upstream {
            (
                root_time - topology_offset(),
                edge.source.clone(),
                format!("Service graph: upstream {} -> {}", edge.source, edge.target),
            )
        } else {
            (
                root_time + topology_offset(),
                edge.target.clone(),
                format!("Service graph: {} -> {}", edge.source, edge.target),
            )
        };
        if edge.error_rate > 0.0 {
            label.push_str(&format!(" (error rate {:.2}%)", edge.error_rate));
        }
        timeline.push(TimelineEvent {
            time,
            event: label,
            service: event_service,
            severity: Severity::Low,
            anomaly_score: 0.0,
            data_source: SignalKind::Traces,
        });
    }
}

fn unique_services(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| !value.is_empty() && seen.insert(value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use faultline_core::models::{
        FailurePattern, Feedback, ListCorrelationsRequest, ListCorrelationsResponse, LogAggregate,
        MetricSample, TimeRange, TraceSpan,
    };
    use faultline_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeSignals {
        metrics: Vec<MetricSample>,
        logs: Vec<LogAggregate>,
        traces: Vec<TraceSpan>,
        graph: Vec<ServiceGraphEdge>,
        fail_metrics: bool,
    }

    #[async_trait]
    impl SignalSource for FakeSignals {
        async fn fetch_metric_series(
            &self,
            _tenant_id: &str,
            _service: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<MetricSample>> {
            if self.fail_metrics {
                return Err(Error::upstream_empty("fetch_metrics"));
            }
            Ok(self.metrics.clone())
        }

        async fn fetch_log_entries(
            &self,
            _tenant_id: &str,
            _service: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<LogAggregate>> {
            Ok(self.logs.clone())
        }

        async fn fetch_trace_spans(
            &self,
            _tenant_id: &str,
            _service: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<TraceSpan>> {
            Ok(self.traces.clone())
        }

        async fn fetch_service_graph(
            &self,
            _tenant_id: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<ServiceGraphEdge>> {
            if self.graph.is_empty() {
                return Err(Error::upstream_empty("fetch_service_graph"));
            }
            Ok(self.graph.clone())
        }
    }

    #[derive(Default)]
    struct FakeStore {
        similar: Vec<CorrelationResult>,
        stored: AtomicUsize,
    }

    #[async_trait]
    impl HistoryStore for FakeStore {
        async fn similar_incidents(
            &self,
            _tenant_id: &str,
            _symptoms: &[String],
            _limit: usize,
        ) -> Result<Vec<CorrelationResult>> {
            Ok(self.similar.clone())
        }

        async fn list_correlations(
            &self,
            _req: &ListCorrelationsRequest,
        ) -> Result<ListCorrelationsResponse> {
            Ok(ListCorrelationsResponse::default())
        }

        async fn fetch_patterns(
            &self,
            _tenant_id: &str,
            _service: Option<&str>,
        ) -> Result<Vec<FailurePattern>> {
            Ok(Vec::new())
        }

        async fn store_patterns(
            &self,
            _tenant_id: &str,
            _patterns: &[FailurePattern],
        ) -> Result<()> {
            Ok(())
        }

        async fn store_feedback(&self, _feedback: &Feedback) -> Result<()> {
            Ok(())
        }

        async fn store_correlation(
            &self,
            _tenant_id: &str,
            _correlation: &CorrelationResult,
        ) -> Result<()> {
            self.stored.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(minute)
    }

    fn request(services: &[&str]) -> InvestigationRequest {
        InvestigationRequest {
            incident_id: "incident-123".into(),
            symptoms: vec!["checkout".into()],
            time_range: TimeRange {
                start: at(0),
                end: at(15),
            },
            affected_services: services.iter().map(|s| s.to_string()).collect(),
            anomaly_threshold: 0.0,
            tenant_id: "tenant-a".into(),
        }
    }

    fn spike_metrics() -> Vec<MetricSample> {
        (0..15)
            .map(|i| MetricSample {
                timestamp: at(i),
                value: if i > 10 { 2.5 } else { 0.5 },
            })
            .collect()
    }

    fn burst_logs() -> Vec<LogAggregate> {
        vec![
            LogAggregate {
                timestamp: at(5),
                message: String::new(),
                severity: "info".into(),
                count: 10,
            },
            LogAggregate {
                timestamp: at(10),
                message: String::new(),
                severity: "error".into(),
                count: 40,
            },
        ]
    }

    fn error_span(service: &str, minute: i64) -> TraceSpan {
        TraceSpan {
            trace_id: "trace-1".into(),
            span_id: "span-1".into(),
            service: service.into(),
            operation: "HTTP POST".into(),
            duration: Duration::from_millis(900),
            status: "error".into(),
            timestamp: at(minute),
        }
    }

    fn chronological(events: &[TimelineEvent]) -> bool {
        events.windows(2).all(|w| w[0].time <= w[1].time)
    }

    #[tokio::test]
    async fn investigates_metric_spike_with_error_burst() {
        let signals = Arc::new(FakeSignals {
            metrics: spike_metrics(),
            logs: burst_logs(),
            traces: vec![error_span("checkout", 11)],
            graph: vec![ServiceGraphEdge {
                source: "checkout".into(),
                target: "payments".into(),
                call_rate: 120.0,
                error_rate: 0.0,
            }],
            ..Default::default()
        });
        let store = Arc::new(FakeStore {
            similar: vec![CorrelationResult {
                recommendations: vec!["Check caching layer".into(), "Verify deployment".into()],
                ..Default::default()
            }],
            ..Default::default()
        });

        let pipeline = Pipeline::new(signals, Some(store.clone()), RuleEngine::default());
        let result = pipeline.investigate(&request(&["checkout"])).await.unwrap();

        assert!(!result.root_cause.is_empty());
        assert!(result.confidence > 0.0);
        assert!(!result.red_anchors.is_empty());
        assert_eq!(
            result.recommendations,
            vec!["Check caching layer", "Verify deployment"]
        );
        assert!(chronological(&result.timeline));
        // Topology neighbour expansion pulls in the downstream dependency.
        assert!(result.affected_services.contains(&"checkout".to_string()));
        assert!(result.affected_services.contains(&"payments".to_string()));
        assert_eq!(store.stored.load(Ordering::SeqCst), 1);
        assert!(result.correlation_id.starts_with("corr-"));
    }

    #[tokio::test]
    async fn upstream_culprit_overrides_root_cause() {
        // payments errors before checkout does, and the graph says payments
        // feeds checkout: causality reassigns the root cause upstream.
        let signals = Arc::new(FakeSignals {
            metrics: spike_metrics(),
            logs: burst_logs(),
            traces: vec![error_span("payments", 2), error_span("checkout", 11)],
            graph: vec![ServiceGraphEdge {
                source: "payments".into(),
                target: "checkout".into(),
                call_rate: 80.0,
                error_rate: 0.04,
            }],
            ..Default::default()
        });

        let pipeline = Pipeline::new(signals, None, RuleEngine::default());
        let result = pipeline.investigate(&request(&["checkout"])).await.unwrap();

        assert_eq!(
            result.root_cause,
            "payments: upstream influence on checkout"
        );
        assert!(result.affected_services.contains(&"payments".to_string()));
        assert!(result
            .timeline
            .iter()
            .any(|e| e.event.contains("Causality: payments precedes checkout")));
        assert!(chronological(&result.timeline));
        assert!(result.confidence > 0.0);
    }

    #[tokio::test]
    async fn rules_fire_when_no_store_is_wired() {
        let signals = Arc::new(FakeSignals {
            metrics: vec![MetricSample {
                timestamp: at(0),
                value: 3.0,
            }],
            ..Default::default()
        });
        let rules = RuleEngine::new(vec![crate::rules::Rule {
            id: "rule1".into(),
            match_on: crate::rules::RuleMatch {
                service: "checkout".into(),
                ..Default::default()
            },
            recommendations: vec!["Rule Rec".into()],
        }]);

        let pipeline = Pipeline::new(signals, None, rules);
        let result = pipeline.investigate(&request(&["checkout"])).await.unwrap();
        assert_eq!(result.recommendations, vec!["Rule Rec"]);
        // Single constant sample: no anomalies, zero confidence.
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.root_cause, "checkout: no dominant anchor");
    }

    #[tokio::test]
    async fn default_recommendations_close_the_chain() {
        let signals = Arc::new(FakeSignals {
            metrics: vec![MetricSample {
                timestamp: at(0),
                value: 3.0,
            }],
            ..Default::default()
        });
        let pipeline = Pipeline::new(signals, None, RuleEngine::default());
        let result = pipeline.investigate(&request(&["checkout"])).await.unwrap();
        assert_eq!(
            result.recommendations,
            vec![
                "Review recent deployments for regressions",
                "Check upstream dependencies for correlated errors"
            ]
        );
    }

    #[tokio::test]
    async fn strict_signal_failure_aborts_without_partial_writes() {
        let signals = Arc::new(FakeSignals {
            fail_metrics: true,
            logs: burst_logs(),
            traces: vec![error_span("checkout", 11)],
            ..Default::default()
        });
        let store = Arc::new(FakeStore::default());

        let pipeline = Pipeline::new(signals, Some(store.clone()), RuleEngine::default());
        let err = pipeline
            .investigate(&request(&["checkout"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("fetch_metrics"));
        assert_eq!(store.stored.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn anchors_and_timeline_are_truncated() {
        let logs: Vec<LogAggregate> = (0..8)
            .map(|i| LogAggregate {
                timestamp: at(i),
                message: String::new(),
                severity: "info".into(),
                count: 10,
            })
            .chain((8..14).map(|i| LogAggregate {
                timestamp: at(i),
                message: String::new(),
                severity: "error".into(),
                count: 100,
            }))
            .collect();
        let traces: Vec<TraceSpan> = (0..12).map(|i| error_span("checkout", i)).collect();

        let signals = Arc::new(FakeSignals {
            metrics: vec![MetricSample {
                timestamp: at(0),
                value: 1.0,
            }],
            logs,
            traces,
            ..Default::default()
        });
        let pipeline = Pipeline::new(signals, None, RuleEngine::default());
        let result = pipeline.investigate(&request(&["checkout"])).await.unwrap();

        assert!(result.red_anchors.len() <= MAX_ANCHORS);
        assert!(result.timeline.len() <= MAX_TIMELINE_EVENTS);
        assert!(chronological(&result.timeline));
        // Descending anchor order.
        assert!(result
            .red_anchors
            .windows(2)
            .all(|w| w[0].anomaly_score >= w[1].anomaly_score));
    }

    #[tokio::test]
    async fn nominal_service_falls_back_to_symptom_then_placeholder() {
        let req = InvestigationRequest {
            affected_services: vec![String::new()],
            ..request(&[])
        };
        assert_eq!(nominal_service(&req), "checkout");

        let req = InvestigationRequest {
            symptoms: Vec::new(),
            ..request(&[])
        };
        assert_eq!(nominal_service(&req), UNKNOWN_SERVICE);
    }

    #[test]
    fn confidence_calibration_bands() {
        assert_eq!(calibrate_confidence(0.0, 0.0), 0.0);
        assert!((calibrate_confidence(0.8, 0.0) - 0.56).abs() < 1e-9);
        assert!((calibrate_confidence(0.8, 1.0) - 0.88).abs() < 1e-9);
        assert_eq!(calibrate_confidence(2.0, 1.0), 1.0);
    }

    #[test]
    fn confidence_caps_at_one() {
        let metric = vec![MetricAnomaly {
            timestamp: at(0),
            value: 9.0,
            score: 9.0,
            threshold: 2.5,
        }];
        let log = vec![LogAnomaly {
            timestamp: at(1),
            severity: "error".into(),
            count: 100,
            score: 9.0,
        }];
        let trace = vec![TraceAnomaly {
            span: error_span("svc", 2),
            score: 9.0,
            mean_duration: 0.2,
        }];
        let confidence = compute_confidence(&metric, &log, &trace);
        assert_eq!(confidence, 1.0);
    }

    #[test]
    fn topology_events_annotate_both_directions() {
        let mut timeline = Vec::new();
        let edges = vec![
            ServiceGraphEdge {
                source: "gateway".into(),
                target: "checkout".into(),
                call_rate: 300.0,
                error_rate: 0.0123,
            },
            ServiceGraphEdge {
                source: "checkout".into(),
                target: "payments".into(),
                call_rate: 120.0,
                error_rate: 0.0,
            },
            ServiceGraphEdge {
                source: "checkout".into(),
                target: "ledger".into(),
                call_rate: 10.0,
                error_rate: 0.0,
            },
        ];
        let root = at(5);
        append_topology_events(&mut timeline, "checkout", &edges, root);

        // Top two edges by call rate only.
        assert_eq!(timeline.len(), 2);
        assert!(timeline[0].event.contains("upstream gateway -> checkout"));
        assert!(timeline[0].event.contains("error rate"));
        assert_eq!(timeline[0].time, root - topology_offset());
        assert!(timeline[1].event.contains("checkout -> payments"));
        assert_eq!(timeline[1].time, root + topology_offset());
    }
}
