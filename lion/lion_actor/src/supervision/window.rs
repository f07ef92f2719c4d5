//! Sliding window of failure timestamps.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timestamps of recent failures, pruned to a fixed look-back window.
#[derive(Debug, Clone)]
pub struct FailureWindow {
    within: Duration,
    timestamps: VecDeque<Instant>,
}

impl FailureWindow {
    /// Empty window looking back `within`.
    pub fn new(within: Duration) -> Self {
        Self {
            within,
            timestamps: VecDeque::new(),
        }
    }

    /// Look-back duration.
    pub fn within(&self) -> Duration {
        self.within
    }

    /// Record a failure at `now` and return how many fall inside the window.
    pub fn record(&mut self, now: Instant) -> usize {
        self.timestamps.push_back(now);
        self.count(now)
    }

    /// Drop expired entries and return how many remain.
    pub fn count(&mut self, now: Instant) -> usize {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) > self.within {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        self.timestamps.len()
    }

    /// Forget every recorded failure.
    pub fn clear(&mut self) {
        self.timestamps.clear();
    }

    /// Whether nothing has been recorded since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
