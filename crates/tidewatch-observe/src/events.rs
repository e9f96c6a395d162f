//! Diagnostic events emitted by the observation engine

use std::fmt;
use std::time::Duration;

use tidewatch_core::ObserveError;
use tracing::Level;

/// Closed set of log messages an observation produces
#[derive(Clone, Debug, PartialEq)]
pub enum ObservationEvent<V> {
    InitialFetchingStarted,
    InitialFetchingCompleted,
    InitialFetchingError {
        attempt: u32,
        retry_in: Duration,
        error: ObserveError,
    },
    InitialFetchingFailed {
        attempts: u32,
        error: ObserveError,
    },
    WillRetry(Duration),
    VersionMisalignment {
        current: V,
        old: V,
        new: V,
    },
    ReducerRequestedRetry(Duration),
    ReducerError(ObserveError),
    /// A relevant change arrived while paused; the held output is dropped
    IdleInvalidated,
}

impl<V> ObservationEvent<V> {
    pub fn level(&self) -> Level {
        match self {
            ObservationEvent::InitialFetchingStarted
            | ObservationEvent::InitialFetchingCompleted
            | ObservationEvent::WillRetry(_)
            | ObservationEvent::ReducerRequestedRetry(_) => Level::INFO,
            ObservationEvent::IdleInvalidated => Level::DEBUG,
            ObservationEvent::InitialFetchingError { .. }
            | ObservationEvent::InitialFetchingFailed { .. }
            | ObservationEvent::VersionMisalignment { .. }
            | ObservationEvent::ReducerError(_) => Level::ERROR,
        }
    }
}

impl<V: fmt::Display> ObservationEvent<V> {
    /// Write the event to the `tracing` subscriber at its level
    pub fn emit(&self) {
        match self.level() {
            Level::ERROR => tracing::error!(target: "tidewatch::observation", "{}", self),
            Level::WARN => tracing::warn!(target: "tidewatch::observation", "{}", self),
            Level::INFO => tracing::info!(target: "tidewatch::observation", "{}", self),
            Level::DEBUG => tracing::debug!(target: "tidewatch::observation", "{}", self),
            _ => tracing::trace!(target: "tidewatch::observation", "{}", self),
        }
    }
}

impl<V: fmt::Display> fmt::Display for ObservationEvent<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationEvent::InitialFetchingStarted => write!(f, "Initial fetching started."),
            ObservationEvent::InitialFetchingCompleted => {
                write!(f, "Initial fetching completed.")
            }
            ObservationEvent::InitialFetchingError {
                attempt,
                retry_in,
                error,
            } => write!(
                f,
                "Initial fetching attempt {} encountered an error: {}. Will retry in {:?}.",
                attempt, error, retry_in
            ),
            ObservationEvent::InitialFetchingFailed { attempts, error } => write!(
                f,
                "Initial fetching failed after {} attempts: {}.",
                attempts, error
            ),
            ObservationEvent::WillRetry(delay) => {
                write!(f, "Will retry observation in {:?}.", delay)
            }
            ObservationEvent::VersionMisalignment { current, old, new } => write!(
                f,
                "Version misalignment. Current: {}. Change from {} to {}.",
                current, old, new
            ),
            ObservationEvent::ReducerRequestedRetry(delay) => {
                write!(f, "Reducer requested retry in {:?}.", delay)
            }
            ObservationEvent::ReducerError(error) => {
                write!(f, "Reducer encountered an error: {}.", error)
            }
            ObservationEvent::IdleInvalidated => write!(
                f,
                "Relevant change while idle. Will re-fetch on resume."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_misalignment_text() {
        let event = ObservationEvent::VersionMisalignment {
            current: 3u64,
            old: 5,
            new: 6,
        };
        assert_eq!(
            event.to_string(),
            "Version misalignment. Current: 3. Change from 5 to 6."
        );
        assert_eq!(event.level(), Level::ERROR);
    }

    #[test]
    fn test_recoverable_events_are_info() {
        let retry: ObservationEvent<u64> = ObservationEvent::WillRetry(Duration::from_secs(1));
        assert_eq!(retry.level(), Level::INFO);
        assert_eq!(retry.to_string(), "Will retry observation in 1s.");

        let requested: ObservationEvent<u64> =
            ObservationEvent::ReducerRequestedRetry(Duration::from_millis(250));
        assert_eq!(requested.level(), Level::INFO);
    }

    #[test]
    fn test_fetch_error_text_includes_attempt_and_delay() {
        let event: ObservationEvent<u64> = ObservationEvent::InitialFetchingError {
            attempt: 2,
            retry_in: Duration::from_secs(4),
            error: ObserveError::SnapshotUnavailable("offline".into()),
        };
        assert_eq!(
            event.to_string(),
            "Initial fetching attempt 2 encountered an error: Snapshot unavailable: offline. Will retry in 4s."
        );
    }

    #[test]
    fn test_emit_without_subscriber_is_harmless() {
        ObservationEvent::<u64>::InitialFetchingStarted.emit();
        ObservationEvent::<u64>::IdleInvalidated.emit();
    }
}
