//! # Faultline Storage
//!
//! Persistence layer for correlation history, mined failure patterns and
//! feedback, backed by a vector/record store with nearest-neighbour recall.
//!
//! Reads for similarity and patterns degrade to deterministic synthetic
//! results when the store is unconfigured or unreachable; history listing
//! and feedback surface store errors. Writes against a missing endpoint are
//! silent no-ops.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

mod vector;

pub use vector::{VectorStore, VectorStoreConfig};

use async_trait::async_trait;

use faultline_core::models::{
    CorrelationResult, FailurePattern, Feedback, ListCorrelationsRequest, ListCorrelationsResponse,
};
use faultline_core::Result;

/// Store operations required by the pipeline, history surface and miner.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Up to `limit` prior correlations closest to the symptom terms,
    /// filtered by tenant. Never fails: degraded reads return synthetic
    /// results labelled by id prefix.
    async fn similar_incidents(
        &self,
        tenant_id: &str,
        symptoms: &[String],
        limit: usize,
    ) -> Result<Vec<CorrelationResult>>;

    /// Paginated correlation history.
    async fn list_correlations(
        &self,
        req: &ListCorrelationsRequest,
    ) -> Result<ListCorrelationsResponse>;

    /// Failure patterns for the tenant, optionally filtered by service
    /// membership.
    async fn fetch_patterns(
        &self,
        tenant_id: &str,
        service: Option<&str>,
    ) -> Result<Vec<FailurePattern>>;

    /// Persists mined patterns, idempotent by pattern id.
    async fn store_patterns(&self, tenant_id: &str, patterns: &[FailurePattern]) -> Result<()>;

    /// Appends feedback for a correlation.
    async fn store_feedback(&self, feedback: &Feedback) -> Result<()>;

    /// Persists a correlation record, idempotent by correlation id.
    async fn store_correlation(
        &self,
        tenant_id: &str,
        correlation: &CorrelationResult,
    ) -> Result<()>;
}
