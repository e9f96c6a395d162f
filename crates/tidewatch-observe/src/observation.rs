//! Storage observation engine
//!
//! Owns one derived output. State transitions run under a single state lock
//! that is never held across an `.await`; while a fetch is suspended the state
//! is `InitialFetching`, which turns flushes, `pause` and `resume` into no-ops.
//! Outputs are published while the state lock is held, so readers observe them
//! in transition order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use tidewatch_channel::{CurrentValueChannel, Subscription};
use tidewatch_core::{
    ChangeFeed, ChangeOrdering, ObserveError, Snapshot, SnapshotVersion, Storage, StorageObserver,
};

use crate::{
    Clock, ObservationConfig, ObservationEvent, ObservationPhase, ObservationState,
    PendingChanges, TokioClock,
};

type VersionOf<O> = SnapshotVersion<<O as StorageObserver>::Snapshot>;
type HeldState<O> = ObservationState<<O as StorageObserver>::Output, VersionOf<O>>;

struct Engine<O, S, C>
where
    O: StorageObserver,
    S: Storage<Snapshot = O::Snapshot>,
    C: Clock,
{
    observer: Arc<O>,
    storage: S,
    clock: C,
    config: ObservationConfig,
    state: Mutex<HeldState<O>>,
    pending: PendingChanges<O::Snapshot>,
    outputs: CurrentValueChannel<O::Output>,
    errors: CurrentValueChannel<ObserveError>,
    finished: AtomicBool,
}

/// Incrementally maintained projection of a storage
///
/// Created bound to one storage and one observer; starts fetching right away.
/// Must be created inside a tokio runtime. Dropping it finishes both output
/// channels.
pub struct StorageObservation<O, S, C = TokioClock>
where
    O: StorageObserver,
    S: Storage<Snapshot = O::Snapshot>,
    C: Clock,
{
    engine: Arc<Engine<O, S, C>>,
    feed: JoinHandle<()>,
}

impl<O, S> StorageObservation<O, S, TokioClock>
where
    O: StorageObserver,
    S: Storage<Snapshot = O::Snapshot>,
{
    /// Observe with the default retry policy and the tokio clock
    pub fn new(observer: O, storage: S) -> Self {
        Self::with_config(observer, storage, ObservationConfig::default(), TokioClock)
    }
}

impl<O, S, C> StorageObservation<O, S, C>
where
    O: StorageObserver,
    S: Storage<Snapshot = O::Snapshot>,
    C: Clock,
{
    pub fn with_config(observer: O, storage: S, config: ObservationConfig, clock: C) -> Self {
        let feed_rx = storage.changes();

        let engine = Arc::new(Engine {
            observer: Arc::new(observer),
            storage,
            clock,
            config,
            state: Mutex::new(ObservationState::Empty),
            pending: PendingChanges::new(),
            outputs: CurrentValueChannel::new(),
            errors: CurrentValueChannel::new(),
            finished: AtomicBool::new(false),
        });

        let feed = tokio::spawn(ingest(Arc::downgrade(&engine), feed_rx));

        let starter = Arc::clone(&engine);
        tokio::spawn(async move {
            starter.resume().await;
        });

        StorageObservation { engine, feed }
    }

    /// Reader of successive outputs
    pub fn outputs(&self) -> Subscription<O::Output> {
        self.engine.outputs.subscribe()
    }

    /// Reader of terminal fetch errors
    pub fn errors(&self) -> Subscription<ObserveError> {
        self.engine.errors.subscribe()
    }

    /// Most recently published output
    pub fn latest_output(&self) -> Option<O::Output> {
        self.engine.outputs.latest().map(|(output, _)| output)
    }

    /// Most recently published terminal error
    pub fn latest_error(&self) -> Option<ObserveError> {
        self.engine.errors.latest().map(|(error, _)| error)
    }

    pub fn phase(&self) -> ObservationPhase {
        self.engine.state.lock().phase()
    }

    /// Version cursor of the held output
    pub fn version(&self) -> Option<VersionOf<O>> {
        self.engine.state.lock().version().cloned()
    }

    /// Changes received but not yet reconciled
    pub fn pending_changes(&self) -> usize {
        self.engine.pending.len()
    }

    pub fn config(&self) -> &ObservationConfig {
        &self.engine.config
    }

    /// Suppress publication; only valid while observing
    ///
    /// A version gap seen while paused still schedules the delayed re-fetch,
    /// and that re-fetch publishes and leaves the observation `Observing`.
    /// Call `pause` again afterwards if publication must stay suppressed.
    pub fn pause(&self) {
        self.engine.pause();
    }

    /// Resume after `pause`, or re-run the initial fetch from the empty state
    pub async fn resume(&self) {
        self.engine.resume().await;
    }

    /// Run [`resume`](Self::resume) on a background task
    pub fn resume_in_background(&self) -> JoinHandle<()> {
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            engine.resume().await;
        })
    }

    /// Finish both output channels and stop ingesting changes. Idempotent.
    pub fn finish(&self) {
        self.engine.finish();
        self.feed.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.engine.is_finished()
    }
}

impl<O, S, C> Drop for StorageObservation<O, S, C>
where
    O: StorageObserver,
    S: Storage<Snapshot = O::Snapshot>,
    C: Clock,
{
    fn drop(&mut self) {
        self.finish();
    }
}

/// Move every change from the feed into the pending buffer, then flush
async fn ingest<O, S, C>(engine: Weak<Engine<O, S, C>>, mut feed: ChangeFeed<O::Snapshot>)
where
    O: StorageObserver,
    S: Storage<Snapshot = O::Snapshot>,
    C: Clock,
{
    while let Some(change) = feed.recv().await {
        let Some(engine) = engine.upgrade() else {
            break;
        };

        engine.pending.push(change);
        // Everything already queued joins the same batch
        while let Ok(change) = feed.try_recv() {
            engine.pending.push(change);
        }

        tokio::spawn(async move {
            engine.flush();
        });
    }
}

impl<O, S, C> Engine<O, S, C>
where
    O: StorageObserver,
    S: Storage<Snapshot = O::Snapshot>,
    C: Clock,
{
    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
        self.outputs.finish();
        self.errors.finish();
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        *state = std::mem::take(&mut *state).pause();
    }

    async fn resume(self: &Arc<Self>) {
        if self.is_finished() {
            return;
        }

        {
            let mut state = self.state.lock();
            match std::mem::take(&mut *state) {
                ObservationState::Idling { output, version } => {
                    *state = ObservationState::Observing { output, version };
                    return;
                }
                ObservationState::Empty => {
                    *state = ObservationState::InitialFetching;
                }
                other => {
                    *state = other;
                    return;
                }
            }
        }

        ObservationEvent::<VersionOf<O>>::InitialFetchingStarted.emit();

        let attempts = self.config.fetch_attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            let observer = Arc::clone(&self.observer);
            let fetched = self
                .storage
                .with_snapshot(move |snapshot| {
                    let output = observer.fetch(snapshot)?;
                    let version = snapshot.version()?;
                    Ok((output, version))
                })
                .await;

            if self.is_finished() {
                *self.state.lock() = ObservationState::Empty;
                return;
            }

            match fetched {
                Ok((output, version)) => {
                    ObservationEvent::<VersionOf<O>>::InitialFetchingCompleted.emit();
                    {
                        let mut state = self.state.lock();
                        self.outputs.send(output.clone());
                        *state = ObservationState::Observing { output, version };
                    }
                    self.flush();
                    return;
                }
                Err(error) if attempt < attempts => {
                    let retry_in = self.config.backoff_for(attempt);
                    ObservationEvent::<VersionOf<O>>::InitialFetchingError {
                        attempt,
                        retry_in,
                        error: error.clone(),
                    }
                    .emit();
                    last_error = Some(error);

                    self.clock.sleep(retry_in).await;
                    if self.is_finished() {
                        *self.state.lock() = ObservationState::Empty;
                        return;
                    }
                }
                Err(error) => {
                    last_error = Some(error);
                }
            }
        }

        let mut state = self.state.lock();
        *state = ObservationState::Empty;
        if let Some(error) = last_error {
            ObservationEvent::<VersionOf<O>>::InitialFetchingFailed {
                attempts,
                error: error.clone(),
            }
            .emit();
            self.errors.send(error);
        }
    }

    /// Reconcile every buffered change against the held output
    fn flush(self: &Arc<Self>) {
        if self.is_finished() {
            return;
        }

        let mut state = self.state.lock();
        let (mut output, mut version, idling) = match std::mem::take(&mut *state) {
            ObservationState::Observing { output, version } => (output, version, false),
            ObservationState::Idling { output, version } => (output, version, true),
            other => {
                // Changes stay buffered until a fetch completes
                *state = other;
                return;
            }
        };

        // From here on `state` is Empty; every early return leaves it that way
        let batch = self.pending.take();
        let mut has_changes = false;

        for record in batch {
            match record.ordering(&version) {
                ChangeOrdering::Stale => continue,
                ChangeOrdering::Misaligned => {
                    ObservationEvent::VersionMisalignment {
                        current: version,
                        old: record.old_version,
                        new: record.new_version,
                    }
                    .emit();
                    self.retry_in(self.config.misalignment_retry_delay);
                    return;
                }
                ChangeOrdering::Consistent => {}
            }

            if !self.observer.is_relevant(&record.change) {
                version = record.new_version;
                continue;
            }

            has_changes = true;
            if idling {
                ObservationEvent::<VersionOf<O>>::IdleInvalidated.emit();
                return;
            }

            if let Err(error) = self.observer.reduce(&mut output, &record.change) {
                let delay = match error.retry_after() {
                    Some(delay) => {
                        ObservationEvent::<VersionOf<O>>::ReducerRequestedRetry(delay).emit();
                        delay
                    }
                    None => {
                        ObservationEvent::<VersionOf<O>>::ReducerError(error).emit();
                        self.config.reducer_retry_delay
                    }
                };
                self.retry_in(delay);
                return;
            }
            version = record.new_version;
        }

        if idling {
            *state = ObservationState::Idling { output, version };
        } else {
            if has_changes {
                self.outputs.send(output.clone());
            }
            *state = ObservationState::Observing { output, version };
        }
    }

    /// Schedule a full re-fetch; the caller has already reset the state to Empty
    fn retry_in(self: &Arc<Self>, delay: Duration) {
        ObservationEvent::<VersionOf<O>>::WillRetry(delay).emit();

        let engine = Arc::downgrade(self);
        let clock = self.clock.clone();
        tokio::spawn(async move {
            clock.sleep(delay).await;
            // Stale timers fall through: dropped engines are gone, finished
            // ones ignore resume, and non-empty states make it a no-op
            if let Some(engine) = engine.upgrade() {
                engine.resume().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    use tidewatch_core::{ObserveResult, VersionedChange};
    use tokio::sync::mpsc;

    struct Cell {
        version: u64,
        value: i64,
    }

    impl Snapshot for Cell {
        type Version = u64;
        type Change = i64;

        fn version(&self) -> ObserveResult<u64> {
            Ok(self.version)
        }
    }

    struct CellStorage {
        cell: Mutex<Cell>,
        feed: Mutex<Option<mpsc::UnboundedReceiver<VersionedChange<u64, i64>>>>,
    }

    impl CellStorage {
        fn new(value: i64) -> (Self, mpsc::UnboundedSender<VersionedChange<u64, i64>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let storage = CellStorage {
                cell: Mutex::new(Cell { version: 0, value }),
                feed: Mutex::new(Some(rx)),
            };
            (storage, tx)
        }
    }

    impl Storage for CellStorage {
        type Snapshot = Cell;

        fn changes(&self) -> ChangeFeed<Cell> {
            match self.feed.lock().take() {
                Some(rx) => rx,
                None => mpsc::unbounded_channel().1,
            }
        }

        fn with_snapshot<T, F>(&self, body: F) -> impl Future<Output = ObserveResult<T>> + Send
        where
            T: Send + 'static,
            F: FnOnce(&Cell) -> ObserveResult<T> + Send + 'static,
        {
            let result = body(&*self.cell.lock());
            std::future::ready(result)
        }
    }

    struct Sum;

    impl StorageObserver for Sum {
        type Snapshot = Cell;
        type Output = i64;

        fn fetch(&self, snapshot: &Cell) -> ObserveResult<i64> {
            Ok(snapshot.value)
        }

        fn is_relevant(&self, change: &i64) -> bool {
            *change != 0
        }

        fn reduce(&self, output: &mut i64, change: &i64) -> ObserveResult<()> {
            *output += change;
            Ok(())
        }

        fn initial_value(&self) -> i64 {
            0
        }
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_initial_fetch_publishes_snapshot_output() {
        let (storage, _tx) = CellStorage::new(41);
        let observation = StorageObservation::new(Sum, storage);
        settle().await;

        assert_eq!(observation.phase(), ObservationPhase::Observing);
        assert_eq!(observation.latest_output(), Some(41));
        assert_eq!(observation.version(), Some(0));
    }

    #[tokio::test]
    async fn test_stale_changes_are_skipped() {
        let (storage, tx) = CellStorage::new(0);
        let observation = StorageObservation::new(Sum, storage);
        settle().await;

        tx.send(VersionedChange::new(0, 1, 5)).unwrap();
        tx.send(VersionedChange::new(0, 1, 5)).unwrap();
        tx.send(VersionedChange::new(1, 2, 1)).unwrap();
        settle().await;

        assert_eq!(observation.latest_output(), Some(6));
        assert_eq!(observation.version(), Some(2));
        assert_eq!(observation.pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_pause_is_ignored_unless_observing() {
        let (storage, _tx) = CellStorage::new(0);
        let observation = StorageObservation::new(Sum, storage);

        // Not started yet: the fetch task has not run
        observation.pause();
        settle().await;
        assert_eq!(observation.phase(), ObservationPhase::Observing);

        observation.pause();
        assert_eq!(observation.phase(), ObservationPhase::Idling);
        observation.resume().await;
        assert_eq!(observation.phase(), ObservationPhase::Observing);
    }

    #[tokio::test]
    async fn test_finish_stops_everything() {
        let (storage, tx) = CellStorage::new(3);
        let observation = StorageObservation::new(Sum, storage);
        settle().await;

        let mut outputs = observation.outputs();
        assert_eq!(outputs.next().await, Some(3));

        observation.finish();
        observation.finish();
        let _ = tx.send(VersionedChange::new(0, 1, 1));
        settle().await;

        assert!(observation.is_finished());
        assert_eq!(outputs.next().await, None);
        assert_eq!(observation.latest_output(), Some(3));
    }
}
