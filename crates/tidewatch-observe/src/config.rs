//! Observation configuration

use std::time::Duration;

/// Retry and backoff policy for a [`StorageObservation`](crate::StorageObservation)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservationConfig {
    /// Initial-fetch attempts before the last error is published
    pub max_fetch_attempts: u32,
    /// Backoff after failed attempt `n` (1-based) is `backoff_unit * 2^n`
    pub backoff_unit: Duration,
    /// Delay before re-fetching after a version misalignment
    pub misalignment_retry_delay: Duration,
    /// Delay before re-fetching after a reducer failure without a retry hint
    pub reducer_retry_delay: Duration,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        ObservationConfig {
            max_fetch_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            misalignment_retry_delay: Duration::from_secs(1),
            reducer_retry_delay: Duration::from_secs(1),
        }
    }
}

impl ObservationConfig {
    pub fn with_max_fetch_attempts(mut self, attempts: u32) -> Self {
        self.max_fetch_attempts = attempts;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_misalignment_retry_delay(mut self, delay: Duration) -> Self {
        self.misalignment_retry_delay = delay;
        self
    }

    pub fn with_reducer_retry_delay(mut self, delay: Duration) -> Self {
        self.reducer_retry_delay = delay;
        self
    }

    /// Number of fetch attempts actually made; at least one
    pub fn fetch_attempts(&self) -> u32 {
        self.max_fetch_attempts.max(1)
    }

    /// Delay after failed attempt `attempt` (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}
