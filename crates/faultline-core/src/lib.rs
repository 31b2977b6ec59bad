//! # Faultline Core
//!
//! Shared foundation for the Faultline root-cause-analysis engine:
//! - Domain models (investigations, correlations, patterns, feedback)
//! - Error taxonomy shared by every crate
//! - Configuration loading (YAML file + environment overrides)
//! - Byte-oriented cache contract with no-op, in-memory and Valkey backends
//! - Latency tracking and process-wide metric helpers

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod cache;
pub mod config;
pub mod error;
pub mod latency;
pub mod metrics;
pub mod models;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CacheError, CacheProvider, MemoryCache, NoopCache};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::latency::LatencyTracker;
    pub use crate::models::{
        CorrelationResult, FailurePattern, Feedback, InvestigationRequest, RedAnchor, Severity,
        SignalKind, TimelineEvent,
    };
}
