//! Request handlers for the four engine operations.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};
use uuid::Uuid;

use faultline_core::latency::LatencyTracker;
use faultline_core::metrics::{observe_investigation, OUTCOME_ERROR, OUTCOME_SUCCESS};
use faultline_core::models::{
    CorrelationResult, FailurePattern, Feedback, InvestigationRequest, ListCorrelationsRequest,
    ListCorrelationsResponse, TimeRange,
};
use faultline_detection::Pipeline;
use faultline_storage::HistoryStore;

use crate::ApiError;

/// Samples between p95 latency log lines.
const LATENCY_LOG_EVERY: usize = 20;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Option<Arc<Pipeline>>,
    pub store: Option<Arc<dyn HistoryStore>>,
    pub latencies: Arc<LatencyTracker>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline.is_some())
            .field("store", &self.store.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(pipeline: Option<Arc<Pipeline>>, store: Option<Arc<dyn HistoryStore>>) -> Self {
        Self {
            pipeline,
            store,
            latencies: Arc::new(LatencyTracker::default()),
        }
    }
}

/// Wire shape of an investigation request; the time range is validated
/// explicitly so its absence maps to `invalid_argument`.
#[derive(Debug, Deserialize)]
pub(crate) struct InvestigateBody {
    #[serde(default)]
    incident_id: String,
    #[serde(default)]
    symptoms: Vec<String>,
    #[serde(default)]
    time_range: Option<TimeRangeBody>,
    #[serde(default)]
    affected_services: Vec<String>,
    #[serde(default)]
    anomaly_threshold: f64,
    #[serde(default)]
    tenant_id: String,
}

#[derive(Debug, Deserialize)]
struct TimeRangeBody {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl InvestigateBody {
    fn into_domain(self) -> Result<InvestigationRequest, ApiError> {
        let range = self.time_range.ok_or_else(|| {
            ApiError::InvalidArgument("investigate: time_range is required".into())
        })?;
        let (start, end) = match (range.start, range.end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(ApiError::InvalidArgument(
                    "investigate: time_range.start and time_range.end are required".into(),
                ))
            }
        };
        let time_range = TimeRange { start, end };
        time_range.validate("investigate")?;

        Ok(InvestigationRequest {
            incident_id: self.incident_id,
            symptoms: self.symptoms,
            time_range,
            affected_services: self.affected_services,
            anomaly_threshold: self.anomaly_threshold,
            tenant_id: self.tenant_id,
        })
    }
}

/// POST /api/v1/investigations
#[instrument(skip(state, body), fields(request_id = %Uuid::new_v4()))]
pub(crate) async fn investigate_incident(
    State(state): State<AppState>,
    Json(body): Json<InvestigateBody>,
) -> Result<Json<CorrelationResult>, ApiError> {
    let pipeline = state
        .pipeline
        .as_ref()
        .ok_or_else(|| ApiError::FailedPrecondition("investigate: pipeline not configured".into()))?
        .clone();

    let request = body.into_domain()?;
    let started = Instant::now();
    let result = pipeline.investigate(&request).await;
    let duration = started.elapsed();

    let result = match result {
        Ok(result) => result,
        Err(err) => {
            observe_investigation(duration, OUTCOME_ERROR);
            error!(error = %err, "investigation failed");
            return Err(err.into());
        }
    };

    observe_investigation(duration, OUTCOME_SUCCESS);
    state.latencies.observe(duration);
    let count = state.latencies.count();
    if count >= LATENCY_LOG_EVERY && count % LATENCY_LOG_EVERY == 0 {
        let p95 = state.latencies.percentile(95.0);
        info!(p95_ms = p95.as_millis() as u64, samples = count, "investigation latency");
    }

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListCorrelationsQuery {
    #[serde(default)]
    tenant_id: String,
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
    #[serde(default)]
    page_size: u32,
    #[serde(default)]
    page_token: String,
}

/// GET /api/v1/correlations
#[instrument(skip(state, query), fields(tenant = %query.tenant_id))]
pub(crate) async fn list_correlations(
    State(state): State<AppState>,
    Query(query): Query<ListCorrelationsQuery>,
) -> Result<Json<ListCorrelationsResponse>, ApiError> {
    let store = require_store(&state, "list_correlations")?;
    if query.tenant_id.is_empty() {
        return Err(ApiError::InvalidArgument(
            "list_correlations: tenant_id is required".into(),
        ));
    }

    let request = ListCorrelationsRequest {
        tenant_id: query.tenant_id,
        service: query.service,
        start: query.start,
        end: query.end,
        page_size: query.page_size,
        page_token: query.page_token,
    };

    let response = store.list_correlations(&request).await.map_err(|err| {
        error!(error = %err, "list correlations failed");
        ApiError::from(err)
    })?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatternsQuery {
    #[serde(default)]
    tenant_id: String,
    #[serde(default)]
    service: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PatternsResponse {
    patterns: Vec<FailurePattern>,
}

/// GET /api/v1/patterns
#[instrument(skip(state, query), fields(tenant = %query.tenant_id))]
pub(crate) async fn get_patterns(
    State(state): State<AppState>,
    Query(query): Query<PatternsQuery>,
) -> Result<Json<PatternsResponse>, ApiError> {
    let store = require_store(&state, "fetch_patterns")?;

    let patterns = store
        .fetch_patterns(&query.tenant_id, query.service.as_deref())
        .await
        .map_err(|err| {
            error!(error = %err, "fetch patterns failed");
            ApiError::from(err)
        })?;
    Ok(Json(PatternsResponse { patterns }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedbackBody {
    #[serde(default)]
    tenant_id: String,
    #[serde(default)]
    correlation_id: String,
    #[serde(default)]
    correct: bool,
    #[serde(default)]
    notes: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct FeedbackAck {
    correlation_id: String,
    accepted: bool,
}

/// POST /api/v1/feedback
#[instrument(skip(state, body), fields(correlation = %body.correlation_id))]
pub(crate) async fn submit_feedback(
    State(state): State<AppState>,
    Json(body): Json<FeedbackBody>,
) -> Result<Json<FeedbackAck>, ApiError> {
    let store = require_store(&state, "store_feedback")?;
    if body.correlation_id.is_empty() {
        return Err(ApiError::InvalidArgument(
            "store_feedback: correlation_id is required".into(),
        ));
    }

    let feedback = Feedback {
        tenant_id: body.tenant_id,
        correlation_id: body.correlation_id.clone(),
        correct: body.correct,
        notes: body.notes,
        submitted_at: Utc::now(),
    };

    store.store_feedback(&feedback).await.map_err(|err| {
        error!(error = %err, "store feedback failed");
        ApiError::from(err)
    })?;

    Ok(Json(FeedbackAck {
        correlation_id: body.correlation_id,
        accepted: true,
    }))
}

/// GET /health
pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

fn require_store(state: &AppState, op: &str) -> Result<Arc<dyn HistoryStore>, ApiError> {
    state.store.as_ref().cloned().ok_or_else(|| {
        ApiError::FailedPrecondition(format!("{op}: history store not configured"))
    })
}
