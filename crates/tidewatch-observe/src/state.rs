//! Observation state machine states

/// State held by a [`StorageObservation`](crate::StorageObservation)
#[derive(Clone, Debug, PartialEq)]
pub enum ObservationState<O, V> {
    /// No output held; nothing is being tracked
    Empty,
    /// A fetch-and-retry loop is in progress
    InitialFetching,
    /// Output is live and updated as changes arrive
    Observing { output: O, version: V },
    /// Output is held, publication suppressed, version cursor still tracked
    Idling { output: O, version: V },
}

/// Payload-free view of [`ObservationState`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObservationPhase {
    Empty,
    InitialFetching,
    Observing,
    Idling,
}

impl<O, V> Default for ObservationState<O, V> {
    fn default() -> Self {
        ObservationState::Empty
    }
}

impl<O, V> ObservationState<O, V> {
    pub fn phase(&self) -> ObservationPhase {
        match self {
            ObservationState::Empty => ObservationPhase::Empty,
            ObservationState::InitialFetching => ObservationPhase::InitialFetching,
            ObservationState::Observing { .. } => ObservationPhase::Observing,
            ObservationState::Idling { .. } => ObservationPhase::Idling,
        }
    }

    /// Version cursor, if an output is held
    pub fn version(&self) -> Option<&V> {
        match self {
            ObservationState::Observing { version, .. } | ObservationState::Idling { version, .. } => {
                Some(version)
            }
            _ => None,
        }
    }

    /// Held output, if any
    pub fn output(&self) -> Option<&O> {
        match self {
            ObservationState::Observing { output, .. } | ObservationState::Idling { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }

    /// `Observing` becomes `Idling`; every other state is unchanged
    pub fn pause(self) -> Self {
        match self {
            ObservationState::Observing { output, version } => {
                ObservationState::Idling { output, version }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_only_from_observing() {
        let observing = ObservationState::Observing {
            output: 7,
            version: 2u64,
        };
        let idling = observing.pause();
        assert_eq!(idling.phase(), ObservationPhase::Idling);
        assert_eq!(idling.output(), Some(&7));
        assert_eq!(idling.version(), Some(&2));

        let fetching = ObservationState::<i32, u64>::InitialFetching.pause();
        assert_eq!(fetching.phase(), ObservationPhase::InitialFetching);

        let empty = ObservationState::<i32, u64>::default().pause();
        assert_eq!(empty.phase(), ObservationPhase::Empty);
        assert_eq!(empty.version(), None);
    }
}
