//! Batched reconciliation agrees with one-at-a-time reconciliation

use proptest::prelude::*;

use tidewatch_observe::StorageObservation;
use tidewatch_test::{collect, settle, CounterObserver, CounterStorage};

/// Publish `values` through a counter, settling after each update or only at the end
fn published(values: &[i64], settle_each: bool) -> Vec<i64> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let storage = CounterStorage::new();
        let observation = StorageObservation::new(CounterObserver::new(), storage.clone());
        let outputs = collect(observation.outputs());
        settle().await;

        for &value in values {
            storage.update_to(value);
            if settle_each {
                settle().await;
            }
        }
        settle().await;

        observation.finish();
        outputs.await.unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_batch_matches_sequential(values in proptest::collection::vec(-20i64..20, 1..12)) {
        let batched = published(&values, false);
        let sequential = published(&values, true);
        let last = values.last().copied();

        prop_assert_eq!(batched.last().copied(), last);
        prop_assert_eq!(sequential.last().copied(), last);

        // One publish per batch with a relevant change, plus the initial fetch
        let relevant = std::iter::once(&0)
            .chain(values.iter())
            .zip(values.iter())
            .filter(|(prev, next)| prev != next)
            .count();
        prop_assert_eq!(sequential.len(), relevant + 1);
        prop_assert_eq!(batched.len(), if relevant > 0 { 2 } else { 1 });
    }
}
