//! Declarative recommendation rules.
//!
//! Rules are data, not code: a YAML file with a top-level `rules:` list is
//! loaded once at startup. A missing file is a successful load with zero
//! rules; a parse error is fatal.

use serde::Deserialize;
use std::path::Path;
use tracing::info;

use faultline_core::models::{InvestigationRequest, RedAnchor, TimelineEvent};
use faultline_core::{Error, Result};

/// A single recommendation rule.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "match", default)]
    pub match_on: RuleMatch,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Optional match attributes; unset attributes always match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleMatch {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub selector_contains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RulePack {
    #[serde(default)]
    rules: Vec<Rule>,
}

/// Read-only rule set applied when similarity recall is insufficient.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Builds an engine over an explicit rule list.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Loads the rule pack at `path`. Empty path or missing file yields an
    /// engine with zero rules; parse errors are returned to the caller.
    pub fn load(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Ok(Self::default());
        }
        let data = match std::fs::read_to_string(Path::new(path)) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path, "rule pack not found, continuing without rules");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(Error::config(
                    format!("rule pack {path} not readable"),
                    Some(Box::new(err)),
                ))
            }
        };

        let pack: RulePack = serde_yaml::from_str(&data).map_err(|e| {
            Error::config(format!("rule pack {path} not parseable"), Some(Box::new(e)))
        })?;
        info!(path, rules = pack.rules.len(), "rule pack loaded");
        Ok(Self::new(pack.rules))
    }

    /// Number of loaded rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Union of recommendations from all firing rules, first-seen order.
    pub fn recommend(
        &self,
        req: &InvestigationRequest,
        anchors: &[RedAnchor],
        timeline: &[TimelineEvent],
    ) -> Vec<String> {
        let mut matched: Vec<String> = Vec::new();
        for rule in &self.rules {
            if !rule.match_on.service.is_empty()
                && !service_matches(&rule.match_on.service, req, anchors)
            {
                continue;
            }
            if !rule.match_on.severity.is_empty()
                && !timeline_has_severity(&rule.match_on.severity, timeline)
            {
                continue;
            }
            if !rule.match_on.selector_contains.is_empty()
                && !anchors_contain(&rule.match_on.selector_contains, anchors)
            {
                continue;
            }
            for rec in &rule.recommendations {
                if !rec.is_empty() && !matched.iter().any(|existing| existing == rec) {
                    matched.push(rec.clone());
                }
            }
        }
        matched
    }
}

fn service_matches(service: &str, req: &InvestigationRequest, anchors: &[RedAnchor]) -> bool {
    req.affected_services
        .iter()
        .any(|s| s.eq_ignore_ascii_case(service))
        || anchors
            .iter()
            .any(|anchor| anchor.service.eq_ignore_ascii_case(service))
}

fn timeline_has_severity(severity: &str, events: &[TimelineEvent]) -> bool {
    events
        .iter()
        .any(|event| event.severity.as_str().eq_ignore_ascii_case(severity))
}

fn anchors_contain(keywords: &[String], anchors: &[RedAnchor]) -> bool {
    anchors.iter().any(|anchor| {
        let selector = anchor.selector.to_lowercase();
        keywords
            .iter()
            .any(|kw| !kw.is_empty() && selector.contains(&kw.to_lowercase()))
    })
}
