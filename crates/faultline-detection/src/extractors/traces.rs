//! Trace anomaly extraction: duration z-score combined with explicit
//! error-status spans.

use faultline_core::models::TraceSpan;

use super::{mean, std_dev};

/// Duration z-score at which a span is admitted.
pub const DURATION_THRESHOLD: f64 = 2.0;

const STD_DEV_FLOOR: f64 = 0.01;

/// An anomalous span within a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceAnomaly {
    pub span: TraceSpan,
    /// May be negative for fast error spans.
    pub score: f64,
    /// Population mean duration in seconds.
    pub mean_duration: f64,
}

impl TraceAnomaly {
    /// Error-status spans are always admitted and mapped to high severity
    /// downstream regardless of their duration score.
    pub fn is_error(&self) -> bool {
        self.span.status == "error"
    }
}

/// Finds spans whose duration z-score meets the threshold, plus every span
/// with status `"error"` (which inherits its computed score).
pub fn detect(spans: &[TraceSpan]) -> Vec<TraceAnomaly> {
    if spans.is_empty() {
        return Vec::new();
    }

    let durations: Vec<f64> = spans.iter().map(|s| s.duration.as_secs_f64()).collect();
    let mean = mean(&durations);
    let mut std_dev = std_dev(&durations, mean);
    if std_dev == 0.0 {
        std_dev = STD_DEV_FLOOR;
    }

    spans
        .iter()
        .zip(&durations)
        .filter_map(|(span, duration)| {
            let score = (duration - mean) / std_dev;
            (score >= DURATION_THRESHOLD || span.status == "error").then(|| TraceAnomaly {
                span: span.clone(),
                score,
                mean_duration: mean,
            })
        })
        .collect()
}
