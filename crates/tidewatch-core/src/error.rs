//! Error types for storage observation

use std::time::Duration;

use thiserror::Error;

/// Errors raised by storage collaborators, observers and the observation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserveError {
    // Storage errors
    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("Snapshot version unavailable: {0}")]
    VersionUnavailable(String),

    // Observer errors
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Raised by a reducer that wants the observation re-fetched after a delay
    #[error("Retry requested after {0:?}")]
    RetryAfter(Duration),

    #[error("Reduce failed: {0}")]
    ReduceFailed(String),

    // Binding errors
    #[error("Observation already started")]
    AlreadyStarted,

    #[error("Observation not started")]
    NotStarted,
}

impl ObserveError {
    /// Delay requested by a reducer, if this is a retry signal
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ObserveError::RetryAfter(duration) => Some(*duration),
            _ => None,
        }
    }
}

/// Result type for observation operations
pub type ObserveResult<T> = Result<T, ObserveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_only_for_retry_signal() {
        let retry = ObserveError::RetryAfter(Duration::from_secs(5));
        assert_eq!(retry.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(ObserveError::ReduceFailed("boom".into()).retry_after(), None);
    }
}
