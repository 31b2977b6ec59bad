//! Log-volume anomaly extraction: deviation from the window median, with
//! an error-severity override.

use chrono::{DateTime, Utc};

use faultline_core::models::LogAggregate;

/// Deviation score at which an entry is admitted.
const SCORE_THRESHOLD: f64 = 3.0;

/// Error-severity entries above 1.3x the median are admitted with this
/// floor score even when the deviation test fails.
const ERROR_FLOOR_SCORE: f64 = 3.0;

/// An error spike or signature surge.
#[derive(Debug, Clone, PartialEq)]
pub struct LogAnomaly {
    pub timestamp: DateTime<Utc>,
    pub severity: String,
    pub count: u64,
    pub score: f64,
}

/// Finds entries whose count deviates from the window median by at least
/// three mean absolute deviations, plus error-severity entries exceeding
/// 1.3x the median.
pub fn detect(entries: &[LogAggregate]) -> Vec<LogAnomaly> {
    if entries.is_empty() {
        return Vec::new();
    }

    let counts: Vec<f64> = entries.iter().map(|e| e.count as f64).collect();
    let median = percentile(&counts, 0.5);
    let mut mad = mean_absolute_deviation(&counts, median);
    if mad == 0.0 {
        mad = 1.0;
    }

    let mut anomalies = Vec::new();
    for entry in entries {
        let score = ((entry.count as f64) - median).abs() / mad;
        if score >= SCORE_THRESHOLD {
            anomalies.push(LogAnomaly {
                timestamp: entry.timestamp,
                severity: entry.severity.clone(),
                count: entry.count,
                score,
            });
        } else if entry.severity.eq_ignore_ascii_case("error")
            && entry.count > (median * 1.3) as u64
        {
            anomalies.push(LogAnomaly {
                timestamp: entry.timestamp,
                severity: entry.severity.clone(),
                count: entry.count,
                score: ERROR_FLOOR_SCORE,
            });
        }
    }
    anomalies
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).expect("counts are finite"));
    let index = (p * (sorted.len() - 1) as f64).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn mean_absolute_deviation(values: &[f64], center: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| (v - center).abs()).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entries(buckets: &[(&str, u64)]) -> Vec<LogAggregate> {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        buckets.iter()
            .enumerate()
            .map(|(i, &(severity, count))| LogAggregate {
                timestamp: base + chrono::Duration::minutes(i as i64),
                message: String::new(),
                severity: severity.to_string(),
                count,
            })
            .collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(detect(&[]).is_empty());
    }

    #[test]
    fn volume_spike_scores_by_deviation() {
        let anomalies = detect(&entries(&[
            ("info", 10),
            ("info", 10),
            ("info", 10),
            ("info", 10),
            ("info", 90),
        ]));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].count, 90);
        assert!(anomalies[0].score >= 3.0);
    }

    #[test]
    fn error_bucket_above_median_gets_floor_score() {
        // Uniform counts keep the deviation score low; the error override
        // still admits the bucket at 1.3x the median.
        let anomalies = detect(&entries(&[
            ("info", 10),
            ("info", 20),
            ("info", 30),
            ("info", 20),
            ("error", 30),
        ]));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, "error");
        assert_eq!(anomalies[0].score, 3.0);
    }

    #[test]
    fn error_severity_matching_is_case_insensitive() {
        let anomalies = detect(&entries(&[
            ("info", 10),
            ("info", 20),
            ("info", 30),
            ("info", 20),
            ("ERROR", 30),
        ]));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, "ERROR");
    }

    #[test]
    fn quiet_error_bucket_is_ignored() {
        let anomalies = detect(&entries(&[
            ("info", 20),
            ("info", 21),
            ("info", 19),
            ("info", 20),
            ("error", 22),
        ]));
        assert!(anomalies.is_empty());
    }
}
