//! Randomized change-feed scripts
//!
//! Drives a counter observation through random interleavings of updates,
//! flush points, pauses, resumes and silent version gaps, then checks that the
//! observed output converges to the storage value.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tidewatch_observe::StorageObservation;

use crate::{collect, settle, CounterObserver, CounterStorage};

/// One step of a feed script
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedStep {
    /// Set the counter, emitting a relevant change
    Update(i64),
    /// Re-set the counter to its current value, emitting an irrelevant change
    Repeat,
    /// Let the feed task and flushes run
    Settle,
    Pause,
    Resume,
    /// Change the counter without emitting, leaving a version gap
    Gap(i64),
}

/// Seeded generator of feed scripts
pub struct FeedFuzzer {
    rng: StdRng,
}

impl FeedFuzzer {
    pub fn new(seed: u64) -> Self {
        FeedFuzzer {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn script(&mut self, len: usize) -> Vec<FeedStep> {
        (0..len).map(|_| self.step()).collect()
    }

    fn step(&mut self) -> FeedStep {
        match self.rng.gen_range(0..100) {
            0..=39 => FeedStep::Update(self.rng.gen_range(-50..50)),
            40..=54 => FeedStep::Repeat,
            55..=79 => FeedStep::Settle,
            80..=87 => FeedStep::Pause,
            88..=95 => FeedStep::Resume,
            _ => FeedStep::Gap(self.rng.gen_range(-50..50)),
        }
    }
}

/// Result of running a feed script
#[derive(Clone, Debug)]
pub struct FuzzOutcome {
    /// Every output published, in order
    pub published: Vec<i64>,
    /// Latest output once the script and all retries have run
    pub final_output: Option<i64>,
    /// Storage value at the end
    pub expected: i64,
    pub snapshots_taken: usize,
}

impl FuzzOutcome {
    pub fn converged(&self) -> bool {
        self.final_output == Some(self.expected)
    }
}

/// Run a script against a fresh counter observation
///
/// Expects a paused tokio clock so retry delays elapse instantly.
pub async fn run_script(steps: &[FeedStep]) -> FuzzOutcome {
    let storage = CounterStorage::new();
    let observation = StorageObservation::new(CounterObserver::new(), storage.clone());
    let published = collect(observation.outputs());
    settle().await;

    for step in steps {
        match step {
            FeedStep::Update(value) => storage.update_to(*value),
            FeedStep::Repeat => storage.update_to(storage.snapshot().value),
            FeedStep::Settle => settle().await,
            FeedStep::Pause => observation.pause(),
            FeedStep::Resume => observation.resume().await,
            FeedStep::Gap(value) => storage.update_silently(*value),
        }
    }

    // One last emitted change exposes any trailing gap
    storage.update_to(storage.snapshot().value + 1);
    observation.resume().await;
    settle().await;

    // Let pending retry timers fire, then pick up anything they left idle
    tokio::time::sleep(observation.config().misalignment_retry_delay * 2).await;
    settle().await;
    observation.resume().await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;

    let final_output = observation.latest_output();
    let expected = storage.snapshot().value;
    let snapshots_taken = storage.snapshots_taken();

    observation.finish();
    let published = published.await.unwrap_or_default();

    FuzzOutcome {
        published,
        final_output,
        expected,
        snapshots_taken,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_are_reproducible() {
        let a = FeedFuzzer::new(7).script(64);
        let b = FeedFuzzer::new(7).script(64);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_converged() {
        let outcome = FuzzOutcome {
            published: vec![0, 5],
            final_output: Some(5),
            expected: 5,
            snapshots_taken: 1,
        };
        assert!(outcome.converged());
    }
}
