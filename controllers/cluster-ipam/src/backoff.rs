//! # Fibonacci Backoff
//!
//! Retry delays for failed VmCluster reconciliations. The sequence grows more
//! slowly than exponential backoff so a flapping provider is retried often
//! enough to converge quickly once it recovers.
//!
//! Default sequence: 5s, 5s, 10s, 15s, 25s, 40s, 65s, ... capped at 5m.

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev: Duration,
    current: Duration,
    max: Duration,
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300))
    }
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min` (used for the first two delays) and capped at `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            prev: Duration::ZERO,
            current: min,
            max,
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_delay(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev + self.current;
        self.prev = self.current;
        self.current = std::cmp::min(next, self.max);
        result
    }
}

/// Per-object backoff bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    /// Record a failure and return the delay before the next attempt
    pub fn record_failure(&mut self) -> Duration {
        self.error_count += 1;
        self.backoff.next_delay()
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }
}
