//! Domain models for investigations, correlation results, failure patterns
//! and the raw signals they are derived from.

mod correlation;
mod pattern;
mod request;
mod signal;

pub use correlation::{CorrelationResult, RedAnchor, Severity, SignalKind, TimelineEvent};
pub use pattern::{AnchorTemplate, FailurePattern};
pub use request::{
    Feedback, InvestigationRequest, ListCorrelationsRequest, ListCorrelationsResponse, TimeRange,
};
pub use signal::{LogAggregate, MetricSample, ServiceGraphEdge, TraceSpan};
