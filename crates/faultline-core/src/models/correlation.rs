//! Investigation output: anchors, timeline events and the correlation record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Signal categories an anomaly can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Metrics,
    Logs,
    Traces,
}

impl SignalKind {
    /// Stable lowercase name used in selectors and stored records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::Logs => "logs",
            Self::Traces => "traces",
        }
    }

    /// Parses the stored representation, defaulting unknown values to metrics.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "logs" => Self::Logs,
            "traces" => Self::Traces,
            _ => Self::Metrics,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Impact levels, ordered `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Maps an anomaly score onto a severity band.
    pub fn from_score(score: f64) -> Self {
        if score >= 4.0 {
            Self::Critical
        } else if score >= 3.0 {
            Self::High
        } else if score >= 2.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Stable lowercase name used in stored records and rule matching.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parses the stored representation, defaulting unknown values to low.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A top-ranked anomaly attributed to a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedAnchor {
    pub service: String,
    /// Selector in `<signal>:<subject>` form, e.g. `metrics:cpu_usage`.
    pub selector: String,
    pub kind: SignalKind,
    pub timestamp: DateTime<Utc>,
    pub anomaly_score: f64,
    /// Threshold at which the anomaly was admitted.
    pub threshold: f64,
}

/// A notable progression during the incident window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub time: DateTime<Utc>,
    pub event: String,
    /// Empty for service-agnostic events.
    pub service: String,
    pub severity: Severity,
    pub anomaly_score: f64,
    pub data_source: SignalKind,
}

/// Investigation outcome persisted for later recall.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub correlation_id: String,
    pub incident_id: String,
    pub root_cause: String,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub affected_services: Vec<String>,
    pub red_anchors: Vec<RedAnchor>,
    pub timeline: Vec<TimelineEvent>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bands() {
        assert_eq!(Severity::from_score(4.0), Severity::Critical);
        assert_eq!(Severity::from_score(3.2), Severity::High);
        assert_eq!(Severity::from_score(2.0), Severity::Medium);
        assert_eq!(Severity::from_score(1.9), Severity::Low);
        assert_eq!(Severity::from_score(-1.0), Severity::Low);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn kind_round_trips_through_serde() {
        let json = serde_json::to_string(&SignalKind::Traces).unwrap();
        assert_eq!(json, "\"traces\"");
        let parsed: SignalKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, SignalKind::Traces);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(SignalKind::parse("LOGS"), SignalKind::Logs);
        assert_eq!(Severity::parse("Critical"), Severity::Critical);
    }
}
