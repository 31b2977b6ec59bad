//! Request shapes accepted by the investigation and history surfaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CorrelationResult;
use crate::error::Error;

/// Closed time interval bounding an investigation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Rejects inverted intervals.
    pub fn validate(&self, op: &'static str) -> Result<(), Error> {
        if self.end < self.start {
            return Err(Error::invalid_input(op, "time range end precedes start"));
        }
        Ok(())
    }
}

/// Incident description driving one investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationRequest {
    #[serde(default)]
    pub incident_id: String,
    /// Free-text symptom terms, ordered, possibly empty.
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub time_range: TimeRange,
    #[serde(default)]
    pub affected_services: Vec<String>,
    /// Zero or negative means "use the detector default".
    #[serde(default)]
    pub anomaly_threshold: f64,
    #[serde(default)]
    pub tenant_id: String,
}

/// Filters for historical correlation listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCorrelationsRequest {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub page_token: String,
}

/// One page of correlation history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCorrelationsResponse {
    pub correlations: Vec<CorrelationResult>,
    /// Decimal offset of the next page; empty when the page was not filled.
    #[serde(default)]
    pub next_page_token: String,
}

/// User feedback on a correlation result. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub tenant_id: String,
    pub correlation_id: String,
    pub correct: bool,
    #[serde(default)]
    pub notes: String,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn inverted_range_is_rejected() {
        let range = TimeRange {
            start: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 6, 1, 11, 0, 0).unwrap(),
        };
        assert!(range.validate("investigate").is_err());
    }

    #[test]
    fn degenerate_range_is_accepted() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let range = TimeRange { start: at, end: at };
        assert!(range.validate("investigate").is_ok());
    }
}
