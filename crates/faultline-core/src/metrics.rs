//! Process-wide investigation metrics.
//!
//! Uses the `metrics` facade; the binary installs a Prometheus exporter and
//! applies [`INVESTIGATION_BUCKETS`] to the latency histogram.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Duration;

/// Outcome label for successful investigations.
pub const OUTCOME_SUCCESS: &str = "success";
/// Outcome label for failed investigations.
pub const OUTCOME_ERROR: &str = "error";

/// Counter partitioned by outcome.
pub const INVESTIGATIONS_TOTAL: &str = "faultline_investigations_total";
/// Investigation latency histogram, in seconds.
pub const INVESTIGATION_SECONDS: &str = "faultline_investigation_seconds";

/// Histogram buckets in seconds.
pub const INVESTIGATION_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0];

/// Registers metric descriptions. Safe to call more than once.
pub fn describe() {
    describe_counter!(
        INVESTIGATIONS_TOTAL,
        "Total number of investigations handled, partitioned by outcome."
    );
    describe_histogram!(
        INVESTIGATION_SECONDS,
        Unit::Seconds,
        "Investigation latency in seconds."
    );
}

/// Records one investigation outcome and its latency.
pub fn observe_investigation(duration: Duration, outcome: &'static str) {
    let outcome = if outcome == OUTCOME_ERROR {
        OUTCOME_ERROR
    } else {
        OUTCOME_SUCCESS
    };
    counter!(INVESTIGATIONS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(INVESTIGATION_SECONDS).record(duration.as_secs_f64());
}
