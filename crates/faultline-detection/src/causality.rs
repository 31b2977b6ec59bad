//! Lightweight temporal/topology causality heuristic.
//!
//! Scores how consistently upstream services precede the nominal root in
//! the timeline and, when the evidence points at a single upstream edge,
//! suggests that edge's source as the likelier culprit.

use chrono::{DateTime, Utc};
use tracing::debug;

use faultline_core::models::{ServiceGraphEdge, TimelineEvent};

/// Outcome of one causality evaluation.
#[derive(Debug, Clone, Default)]
pub struct CausalityOutcome {
    /// In `[0, 1]`; zero when no upstream edges exist.
    pub score: f64,
    /// Free-text evidence notes, one per inspected edge.
    pub notes: Vec<String>,
    /// Upstream service best explaining the incident, if any.
    pub suggested_service: Option<String>,
}

/// Evaluates upstream edges of `root_service` against the timeline.
///
/// Two rankings pick the suggested edge: time-supporting edges rank by
/// call rate, error-rate-supporting edges by error rate. The classes do
/// not mix and the time-supporting class wins when present.
pub fn evaluate(
    root_service: &str,
    timeline: &[TimelineEvent],
    edges: &[ServiceGraphEdge],
) -> CausalityOutcome {
    let mut outcome = CausalityOutcome::default();
    if root_service.is_empty() || edges.is_empty() || timeline.is_empty() {
        return outcome;
    }

    let root_time = first_event_time(root_service, timeline).unwrap_or(timeline[0].time);

    let mut total_upstream = 0usize;
    let mut supporting = 0usize;
    let mut best_time_edge: Option<&ServiceGraphEdge> = None;
    let mut best_error_edge: Option<&ServiceGraphEdge> = None;

    for edge in edges {
        if !edge.target.eq_ignore_ascii_case(root_service) {
            continue;
        }
        total_upstream += 1;

        match first_event_time(&edge.source, timeline) {
            None => {
                if edge.error_rate > 0.0 {
                    supporting += 1;
                    outcome.notes.push(format!(
                        "{} error rate influencing {}",
                        edge.source, root_service
                    ));
                    if best_error_edge.map_or(true, |best| edge.error_rate > best.error_rate) {
                        best_error_edge = Some(edge);
                    }
                }
            }
            Some(src_time) if src_time < root_time => {
                supporting += 1;
                outcome
                    .notes
                    .push(format!("{} precedes {}", edge.source, root_service));
                if best_time_edge.map_or(true, |best| edge.call_rate > best.call_rate) {
                    best_time_edge = Some(edge);
                }
            }
            Some(_) => {
                outcome
                    .notes
                    .push(format!("{} occurs after root cause", edge.source));
            }
        }
    }

    if total_upstream == 0 {
        return outcome;
    }

    let ratio = (supporting as f64 / total_upstream as f64).clamp(0.0, 1.0);
    outcome.score = (0.4 + 0.6 * ratio).clamp(0.0, 1.0);
    outcome.suggested_service = best_time_edge
        .or(best_error_edge)
        .map(|edge| edge.source.clone());

    debug!(
        root = root_service,
        score = outcome.score,
        supporting,
        total_upstream,
        "causality evaluated"
    );
    outcome
}

/// First (earliest, since timelines are sorted) event time for a service.
pub fn first_event_time(service: &str, events: &[TimelineEvent]) -> Option<DateTime<Utc>> {
    events
        .iter()
        .find(|event| event.service.eq_ignore_ascii_case(service))
        .map(|event| event.time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use faultline_core::models::{Severity, SignalKind};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, minute, 0).unwrap()
    }

    fn event(service: &str, minute: u32) -> TimelineEvent {
        TimelineEvent {
            time: at(minute),
            event: "anomaly".into(),
            service: service.into(),
            severity: Severity::Medium,
            anomaly_score: 2.0,
            data_source: SignalKind::Metrics,
        }
    }

    fn edge(source: &str, target: &str, call_rate: f64, error_rate: f64) -> ServiceGraphEdge {
        ServiceGraphEdge {
            source: source.into(),
            target: target.into(),
            call_rate,
            error_rate,
        }
    }

    #[test]
    fn no_data_scores_zero() {
        let outcome = evaluate("checkout", &[], &[]);
        assert_eq!(outcome.score, 0.0);
        assert!(outcome.suggested_service.is_none());
    }

    #[test]
    fn no_upstream_edges_scores_zero() {
        let timeline = vec![event("checkout", 5)];
        let edges = vec![edge("checkout", "payments", 100.0, 0.0)];
        let outcome = evaluate("checkout", &timeline, &edges);
        assert_eq!(outcome.score, 0.0);
        assert!(outcome.suggested_service.is_none());
    }

    #[test]
    fn preceding_upstream_scores_full() {
        let timeline = vec![event("payments", 4), event("checkout", 5)];
        let edges = vec![edge("payments", "checkout", 100.0, 0.0)];
        let outcome = evaluate("checkout", &timeline, &edges);
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.suggested_service.as_deref(), Some("payments"));
        assert!(outcome.notes.iter().any(|n| n.contains("precedes")));
    }

    #[test]
    fn late_upstream_halves_support() {
        let timeline = vec![event("checkout", 5), event("db", 9), event("cache", 2)];
        let edges = vec![
            edge("db", "checkout", 50.0, 0.0),
            edge("cache", "checkout", 80.0, 0.0),
        ];
        let outcome = evaluate("checkout", &timeline, &edges);
        // One of two upstream edges supports: 0.4 + 0.6 * 0.5
        assert!((outcome.score - 0.7).abs() < 1e-9);
        assert_eq!(outcome.suggested_service.as_deref(), Some("cache"));
        assert!(outcome.notes.iter().any(|n| n.contains("occurs after")));
    }

    #[test]
    fn silent_erroring_upstream_supports() {
        let timeline = vec![event("checkout", 5)];
        let edges = vec![edge("payments", "checkout", 100.0, 0.12)];
        let outcome = evaluate("checkout", &timeline, &edges);
        assert_eq!(outcome.score, 1.0);
        assert_eq!(outcome.suggested_service.as_deref(), Some("payments"));
        assert!(outcome.notes.iter().any(|n| n.contains("error rate")));
    }

    #[test]
    fn time_supporting_class_beats_error_class() {
        // The erroring edge has the higher call rate, but a time-supporting
        // edge exists and its class wins outright.
        let timeline = vec![event("slowpoke", 1), event("checkout", 5)];
        let edges = vec![
            edge("noisy", "checkout", 500.0, 0.9),
            edge("slowpoke", "checkout", 10.0, 0.0),
        ];
        let outcome = evaluate("checkout", &timeline, &edges);
        assert_eq!(outcome.suggested_service.as_deref(), Some("slowpoke"));
    }

    #[test]
    fn target_matching_is_case_insensitive() {
        let timeline = vec![event("payments", 4), event("Checkout", 5)];
        let edges = vec![edge("payments", "CHECKOUT", 100.0, 0.0)];
        let outcome = evaluate("checkout", &timeline, &edges);
        assert_eq!(outcome.score, 1.0);
    }
}
