//! Single-counter storage and observer
//!
//! The storage holds one integer. Every update bumps a `u64` version and emits
//! the difference to the previous value as the change payload; zero deltas are
//! irrelevant to the observer.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use tidewatch_core::{
    ChangeFeed, ChangeRecord, ObserveError, ObserveResult, Snapshot, Storage, StorageObserver,
    VersionedChange,
};

/// Consistent view of the counter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub version: u64,
    pub value: i64,
}

impl Snapshot for CounterSnapshot {
    type Version = u64;
    type Change = i64;

    fn version(&self) -> ObserveResult<u64> {
        Ok(self.version)
    }
}

/// In-memory counter storage with snapshot fault injection
#[derive(Default)]
pub struct CounterStorage {
    snapshot: Mutex<CounterSnapshot>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ChangeRecord<CounterSnapshot>>>>,
    snapshots_taken: AtomicUsize,
    failing_snapshots: AtomicU32,
}

impl CounterStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Storage starting at `value`, version 0
    pub fn with_value(value: i64) -> Arc<Self> {
        let storage = Self::default();
        storage.snapshot.lock().value = value;
        Arc::new(storage)
    }

    /// Set the counter and emit the resulting change
    pub fn update_to(&self, value: i64) {
        let record = {
            let mut snapshot = self.snapshot.lock();
            let old_version = snapshot.version;
            let change = value - snapshot.value;
            snapshot.version += 1;
            snapshot.value = value;
            VersionedChange::new(old_version, snapshot.version, change)
        };
        self.emit(record);
    }

    /// Set the counter and bump the version without emitting anything
    ///
    /// The next emitted change will not start at the version observers hold.
    pub fn update_silently(&self, value: i64) {
        let mut snapshot = self.snapshot.lock();
        snapshot.version += 1;
        snapshot.value = value;
    }

    /// Push a raw record to every subscriber
    pub fn emit(&self, record: ChangeRecord<CounterSnapshot>) {
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(record.clone()).is_ok());
    }

    /// Make the next `count` snapshot requests fail
    pub fn fail_next_snapshots(&self, count: u32) {
        self.failing_snapshots.store(count, Ordering::SeqCst);
    }

    /// Number of snapshot requests served or refused
    pub fn snapshots_taken(&self) -> usize {
        self.snapshots_taken.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        *self.snapshot.lock()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn take_failure(&self) -> bool {
        self.failing_snapshots
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl Storage for CounterStorage {
    type Snapshot = CounterSnapshot;

    fn changes(&self) -> ChangeFeed<CounterSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    fn with_snapshot<T, F>(&self, body: F) -> impl Future<Output = ObserveResult<T>> + Send
    where
        T: Send + 'static,
        F: FnOnce(&CounterSnapshot) -> ObserveResult<T> + Send + 'static,
    {
        self.snapshots_taken.fetch_add(1, Ordering::SeqCst);

        let result = if self.take_failure() {
            Err(ObserveError::SnapshotUnavailable("counter offline".into()))
        } else {
            let snapshot = self.snapshot();
            body(&snapshot)
        };
        std::future::ready(result)
    }
}

/// Observer that mirrors the counter value
#[derive(Clone, Default)]
pub struct CounterObserver {
    reduce_faults: Arc<Mutex<VecDeque<ObserveError>>>,
    reductions: Arc<AtomicUsize>,
}

impl CounterObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next reduce call with `error`
    pub fn fail_next_reduce(&self, error: ObserveError) {
        self.reduce_faults.lock().push_back(error);
    }

    /// Number of successful reduce calls
    pub fn reductions(&self) -> usize {
        self.reductions.load(Ordering::SeqCst)
    }
}

impl StorageObserver for CounterObserver {
    type Snapshot = CounterSnapshot;
    type Output = i64;

    fn fetch(&self, snapshot: &CounterSnapshot) -> ObserveResult<i64> {
        Ok(snapshot.value)
    }

    fn is_relevant(&self, change: &i64) -> bool {
        *change != 0
    }

    fn reduce(&self, output: &mut i64, change: &i64) -> ObserveResult<()> {
        if let Some(error) = self.reduce_faults.lock().pop_front() {
            return Err(error);
        }
        *output += change;
        self.reductions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn initial_value(&self) -> i64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_emits_delta_with_version_step() {
        let storage = CounterStorage::with_value(10);
        let mut feed = storage.changes();

        storage.update_to(13);
        storage.update_to(13);

        let first = feed.try_recv().unwrap();
        assert_eq!(first, VersionedChange::new(0, 1, 3));
        let second = feed.try_recv().unwrap();
        assert_eq!(second, VersionedChange::new(1, 2, 0));
        assert_eq!(storage.snapshot(), CounterSnapshot { version: 2, value: 13 });
    }

    #[test]
    fn test_closed_subscribers_are_dropped() {
        let storage = CounterStorage::new();
        let feed = storage.changes();
        assert_eq!(storage.subscriber_count(), 1);

        drop(feed);
        storage.update_to(1);
        assert_eq!(storage.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_faults_are_consumed() {
        let storage = CounterStorage::with_value(4);
        storage.fail_next_snapshots(1);

        let failed = storage.with_snapshot(|s: &CounterSnapshot| Ok(s.value)).await;
        assert!(matches!(failed, Err(ObserveError::SnapshotUnavailable(_))));

        let value = storage.with_snapshot(|s: &CounterSnapshot| Ok(s.value)).await;
        assert_eq!(value, Ok(4));
        assert_eq!(storage.snapshots_taken(), 2);
    }

    #[test]
    fn test_observer_reduce_faults_are_one_shot() {
        let observer = CounterObserver::new();
        observer.fail_next_reduce(ObserveError::ReduceFailed("bad delta".into()));

        let mut output = 1;
        assert!(observer.reduce(&mut output, &2).is_err());
        assert_eq!(output, 1);
        assert!(observer.reduce(&mut output, &2).is_ok());
        assert_eq!(output, 3);
        assert_eq!(observer.reductions(), 1);
        assert!(!observer.is_relevant(&0));
    }
}
