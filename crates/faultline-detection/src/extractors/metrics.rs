//! Metric anomaly extraction via population z-score.

use chrono::{DateTime, Utc};

use faultline_core::models::MetricSample;

use super::{mean, std_dev};

/// Default z-score admission threshold.
pub const DEFAULT_THRESHOLD: f64 = 2.5;

/// Substituted for a zero standard deviation.
const STD_DEV_FLOOR: f64 = 0.01;

/// An anomalous metric sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricAnomaly {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub score: f64,
    /// Threshold at which the sample was admitted.
    pub threshold: f64,
}

/// Finds samples whose z-score meets `threshold` (one-sided, upper tail:
/// drops in a latency-like series are not flagged). A threshold of zero or
/// below selects [`DEFAULT_THRESHOLD`].
pub fn detect(series: &[MetricSample], threshold: f64) -> Vec<MetricAnomaly> {
    if series.is_empty() {
        return Vec::new();
    }

    let threshold = if threshold <= 0.0 {
        DEFAULT_THRESHOLD
    } else {
        threshold
    };

    let values: Vec<f64> = series.iter().map(|s| s.value).collect();
    let mean = mean(&values);
    let mut std_dev = std_dev(&values, mean);
    if std_dev == 0.0 {
        std_dev = STD_DEV_FLOOR;
    }

    series
        .iter()
        .filter_map(|sample| {
            let score = (sample.value - mean) / std_dev;
            (score >= threshold).then_some(MetricAnomaly {
                timestamp: sample.timestamp,
                value: sample.value,
                score,
                threshold,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn series(values: &[f64]) -> Vec<MetricSample> {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| MetricSample {
                timestamp: base + chrono::Duration::minutes(i as i64),
                value,
            })
            .collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(detect(&[], 2.5).is_empty());
    }

    #[test]
    fn spike_tail_is_detected() {
        let mut values = vec![0.5; 12];
        values.extend([2.5, 2.5, 2.5]);
        let anomalies = detect(&series(&values), 1.0);
        assert_eq!(anomalies.len(), 3);
        assert!(anomalies.iter().all(|a| a.value == 2.5 && a.score >= 1.0));
        assert!(anomalies.iter().all(|a| a.threshold == 1.0));
    }

    #[test]
    fn constant_series_emits_nothing() {
        // Sigma substitution avoids division by zero, but every score is 0.
        let anomalies = detect(&series(&[1.0; 20]), 0.0);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn non_positive_threshold_uses_default() {
        let mut values = vec![0.5; 14];
        values.push(0.6);
        // z-score of the bump is well below 2.5.
        assert!(detect(&series(&values), -1.0).is_empty());
    }

    #[test]
    fn drops_are_not_flagged() {
        let mut values = vec![5.0; 14];
        values.push(0.1);
        assert!(detect(&series(&values), 2.0).is_empty());
    }
}
