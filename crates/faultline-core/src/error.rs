//! Error taxonomy shared across the Faultline crates.
//!
//! Every surfaced error carries a short operation name so that transport
//! layers can render a stable, human-readable message without stack traces.

use thiserror::Error;

/// Convenient result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error preserved for `std::error::Error::source` chains.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while running an investigation or serving history.
#[derive(Debug, Error)]
pub enum Error {
    /// A required request field is missing or malformed.
    #[error("{op}: {message}")]
    InvalidInput {
        /// Short operation name, e.g. `investigate`.
        op: &'static str,
        /// Human-readable description of the violation.
        message: String,
    },

    /// The upstream signal aggregator is unreachable or rejected the call.
    #[error("{op}: upstream request failed")]
    UpstreamUnavailable {
        op: &'static str,
        #[source]
        source: BoxError,
    },

    /// The upstream answered 2xx but the expected array was empty.
    #[error("{op}: upstream returned no data")]
    UpstreamEmpty { op: &'static str },

    /// A tolerated dependency (service graph) failed; the investigation
    /// continues with degraded data.
    #[error("{op}: dependency degraded")]
    DependencyDegraded {
        op: &'static str,
        #[source]
        source: BoxError,
    },

    /// The history / pattern store could not be reached.
    #[error("{op}: store unreachable")]
    StoreUnreachable {
        op: &'static str,
        #[source]
        source: BoxError,
    },

    /// The history / pattern store rejected the request.
    #[error("{op}: store rejected request: {message}")]
    StoreRejected { op: &'static str, message: String },

    /// A component required for the operation has not been wired.
    #[error("{op}: {component} not configured")]
    NotConfigured {
        op: &'static str,
        component: &'static str,
    },

    /// Configuration could not be loaded or parsed.
    #[error("config: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl Error {
    /// Invalid-input constructor.
    pub fn invalid_input(op: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            op,
            message: message.into(),
        }
    }

    /// Wraps an upstream transport or decode failure.
    pub fn upstream(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self::UpstreamUnavailable {
            op,
            source: source.into(),
        }
    }

    /// Marks a 2xx-but-empty upstream response.
    pub fn upstream_empty(op: &'static str) -> Self {
        Self::UpstreamEmpty { op }
    }

    /// Wraps a store connectivity failure.
    pub fn store_unreachable(op: &'static str, source: impl Into<BoxError>) -> Self {
        Self::StoreUnreachable {
            op,
            source: source.into(),
        }
    }

    /// Store-side rejection (non-2xx with a body).
    pub fn store_rejected(op: &'static str, message: impl Into<String>) -> Self {
        Self::StoreRejected {
            op,
            message: message.into(),
        }
    }

    /// Missing wiring, mapped to `failed_precondition` at the API edge.
    pub fn not_configured(op: &'static str, component: &'static str) -> Self {
        Self::NotConfigured { op, component }
    }

    /// Configuration failure with an optional cause.
    pub fn config(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Self::Config {
            message: message.into(),
            source,
        }
    }

    /// True when the error indicates caller fault rather than system fault.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_operation_names() {
        let err = Error::invalid_input("investigate", "time range is required");
        assert_eq!(err.to_string(), "investigate: time range is required");

        let err = Error::upstream_empty("fetch_metrics");
        assert_eq!(err.to_string(), "fetch_metrics: upstream returned no data");
    }

    #[test]
    fn upstream_errors_preserve_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::upstream("fetch_logs", io);
        assert!(err.source().is_some());
    }
}
