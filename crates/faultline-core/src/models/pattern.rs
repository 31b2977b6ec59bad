//! Mined failure patterns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recurring anomaly signature inside a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorTemplate {
    pub service: String,
    /// One of `metrics`, `logs`, `traces`.
    pub signal_type: String,
    pub selector: String,
    /// Typical lead/lag relative to the incident epicentre.
    pub typical_lag: f64,
    pub threshold: f64,
}

/// A per-service failure template mined from correlation history.
///
/// Later mining runs overwrite patterns keyed by `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailurePattern {
    pub id: String,
    pub name: String,
    pub description: String,
    pub services: Vec<String>,
    #[serde(default)]
    pub anchor_templates: Vec<AnchorTemplate>,
    /// Fraction of the mined batch this service appeared in, `[0, 1]`.
    pub prevalence: f64,
    pub last_seen: DateTime<Utc>,
    pub precision: f64,
    pub recall: f64,
}
