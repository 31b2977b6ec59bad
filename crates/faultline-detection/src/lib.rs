//! # Faultline Detection
//!
//! The investigation brain: three pure anomaly extractors, the declarative
//! rule engine, the causality heuristic, the pattern miner and the pipeline
//! that sequences them into a correlation result.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod causality;
pub mod extractors;
pub mod miner;
pub mod pipeline;
pub mod rules;

pub use causality::CausalityOutcome;
pub use extractors::{LogAnomaly, MetricAnomaly, TraceAnomaly};
pub use miner::Miner;
pub use pipeline::Pipeline;
pub use rules::{Rule, RuleEngine, RuleMatch};
