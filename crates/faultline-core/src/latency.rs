//! Bounded latency sample buffer with percentile queries.

use std::collections::VecDeque;
use std::sync::RwLock;
use std::time::Duration;

const DEFAULT_MAX_SAMPLES: usize = 1024;

/// Stores the most recent duration samples and computes percentiles.
///
/// Recording is O(1) amortised; percentile queries sort a copy. A
/// reader-writer lock permits concurrent reads and rare writers.
#[derive(Debug)]
pub struct LatencyTracker {
    samples: RwLock<VecDeque<Duration>>,
    max_samples: usize,
}

impl LatencyTracker {
    /// Creates a tracker storing up to `max_samples` entries.
    pub fn new(max_samples: usize) -> Self {
        let max_samples = if max_samples == 0 {
            DEFAULT_MAX_SAMPLES
        } else {
            max_samples
        };
        Self {
            samples: RwLock::new(VecDeque::with_capacity(max_samples)),
            max_samples,
        }
    }

    /// Records a new duration, evicting the oldest sample at capacity.
    pub fn observe(&self, d: Duration) {
        let mut samples = self.samples.write().expect("latency lock poisoned");
        if samples.len() == self.max_samples {
            samples.pop_front();
        }
        samples.push_back(d);
    }

    /// Returns the `p` percentile (0-100) duration, zero without samples.
    pub fn percentile(&self, p: f64) -> Duration {
        let samples = self.samples.read().expect("latency lock poisoned");
        if samples.is_empty() {
            return Duration::ZERO;
        }

        let mut sorted: Vec<Duration> = samples.iter().copied().collect();
        sorted.sort_unstable();

        if p <= 0.0 {
            return sorted[0];
        }
        if p >= 100.0 {
            return sorted[sorted.len() - 1];
        }

        let index = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }

    /// Number of samples currently held.
    pub fn count(&self) -> usize {
        self.samples.read().expect("latency lock poisoned").len()
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAMPLES)
    }
}
