//! Frequency-based failure-pattern mining over correlation history.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

use faultline_core::models::{AnchorTemplate, CorrelationResult, FailurePattern};
use faultline_core::Result;
use faultline_storage::HistoryStore;

/// Selectors kept per mined pattern.
const TOP_SELECTORS: usize = 3;

/// Defaults until overwritten by offline evaluation.
const DEFAULT_PRECISION: f64 = 0.5;
const DEFAULT_RECALL: f64 = 0.5;

/// Mines per-service failure patterns from a batch of correlations and
/// persists them through the store contract.
pub struct Miner {
    store: Option<Arc<dyn HistoryStore>>,
}

impl std::fmt::Debug for Miner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Miner")
            .field("store", &self.store.is_some())
            .finish()
    }
}

#[derive(Default)]
struct ServiceAggregate {
    count: usize,
    last_seen: Option<DateTime<Utc>>,
    selector_counts: HashMap<String, usize>,
    selector_scores: HashMap<String, f64>,
}

impl ServiceAggregate {
    fn touch(&mut self, created_at: DateTime<Utc>) {
        if self.last_seen.map_or(true, |seen| created_at > seen) {
            self.last_seen = Some(created_at);
        }
    }

    fn top_selectors(&self, limit: usize) -> Vec<String> {
        let mut selectors: Vec<&String> = self.selector_counts.keys().collect();
        selectors.sort_by(|a, b| {
            self.selector_counts[*b]
                .cmp(&self.selector_counts[*a])
                .then_with(|| a.cmp(b))
        });
        selectors.into_iter().take(limit).cloned().collect()
    }
}

impl Miner {
    /// `store` may be `None` for dry runs.
    pub fn new(store: Option<Arc<dyn HistoryStore>>) -> Self {
        Self { store }
    }

    /// Aggregates correlations into per-service patterns, sorted by
    /// descending prevalence. Empty input returns empty output; store
    /// failures during persistence are logged and absorbed.
    #[instrument(skip(self, correlations), fields(tenant = tenant_id, batch = correlations.len()))]
    pub async fn mine(
        &self,
        tenant_id: &str,
        correlations: &[CorrelationResult],
    ) -> Result<Vec<FailurePattern>> {
        if correlations.is_empty() {
            return Ok(Vec::new());
        }

        let mut stats: HashMap<String, ServiceAggregate> = HashMap::new();
        for correlation in correlations {
            for service in &correlation.affected_services {
                let agg = stats.entry(normalize(service)).or_default();
                agg.count += 1;
                agg.touch(correlation.created_at);
            }
            for anchor in &correlation.red_anchors {
                if anchor.selector.is_empty() {
                    continue;
                }
                let agg = stats.entry(normalize(&anchor.service)).or_default();
                *agg.selector_counts.entry(anchor.selector.clone()).or_default() += 1;
                *agg.selector_scores.entry(anchor.selector.clone()).or_default() +=
                    anchor.anomaly_score;
                agg.touch(correlation.created_at);
            }
        }

        let mut patterns: Vec<FailurePattern> = stats
            .into_iter()
            .filter(|(_, agg)| agg.count > 0)
            .map(|(service, agg)| {
                let anchor_templates = agg
                    .top_selectors(TOP_SELECTORS)
                    .into_iter()
                    .map(|selector| {
                        let mean_score =
                            agg.selector_scores[&selector] / agg.selector_counts[&selector] as f64;
                        AnchorTemplate {
                            service: service.clone(),
                            signal_type: infer_signal_type(&selector).to_string(),
                            selector,
                            typical_lag: 1.0,
                            threshold: mean_score,
                        }
                    })
                    .collect();

                FailurePattern {
                    id: format!("pattern-{service}"),
                    name: format!("{service} hotspot"),
                    description: "Auto-mined pattern based on historical anomalies".into(),
                    services: vec![service],
                    anchor_templates,
                    prevalence: agg.count as f64 / correlations.len() as f64,
                    last_seen: agg.last_seen.unwrap_or(DateTime::UNIX_EPOCH),
                    precision: DEFAULT_PRECISION,
                    recall: DEFAULT_RECALL,
                }
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.prevalence
                .partial_cmp(&a.prevalence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        if let Some(store) = &self.store {
            if !patterns.is_empty() {
                if let Err(err) = store.store_patterns(tenant_id, &patterns).await {
                    warn!(error = %err, "pattern store failed");
                }
            }
        }

        Ok(patterns)
    }
}

fn normalize(service: &str) -> String {
    if service.is_empty() {
        "unknown".to_string()
    } else {
        service.to_string()
    }
}

fn infer_signal_type(selector: &str) -> &'static str {
    if selector.contains("log") {
        "logs"
    } else if selector.contains("trace") {
        "traces"
    } else {
        "metrics"
    }
}
