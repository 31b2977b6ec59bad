//! Route definitions.

use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    get_patterns, health, investigate_incident, list_correlations, submit_feedback, AppState,
};

/// Builds the engine router with a per-request timeout.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let api_v1 = Router::new()
        .route("/investigations", post(investigate_incident))
        .route("/correlations", get(list_correlations))
        .route("/patterns", get(get_patterns))
        .route("/feedback", post(submit_feedback));

    Router::new()
        .nest("/api/v1", api_v1)
        .route("/health", get(health))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
