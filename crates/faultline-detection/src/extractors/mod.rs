//! Pure anomaly extractors over raw signals.
//!
//! All three return an empty vector on empty input and never read the
//! clock; scores are dimensionless, higher meaning more anomalous.

pub mod logs;
pub mod metrics;
pub mod traces;

pub use logs::LogAnomaly;
pub use metrics::MetricAnomaly;
pub use traces::TraceAnomaly;

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}
