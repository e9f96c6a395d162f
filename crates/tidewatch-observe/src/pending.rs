//! Pending change buffer
//!
//! Appended by the change-feed task, drained by flushes. Guarded by its own
//! lock so ingestion never waits for a flush to finish.

use parking_lot::Mutex;
use tidewatch_core::{ChangeRecord, Snapshot};

pub struct PendingChanges<S: Snapshot> {
    changes: Mutex<Vec<ChangeRecord<S>>>,
}

impl<S: Snapshot> PendingChanges<S> {
    pub fn new() -> Self {
        PendingChanges {
            changes: Mutex::new(Vec::new()),
        }
    }

    /// Append a change in receipt order
    pub fn push(&self, change: ChangeRecord<S>) {
        self.changes.lock().push(change);
    }

    /// Take every buffered change, leaving the buffer empty
    pub fn take(&self) -> Vec<ChangeRecord<S>> {
        std::mem::take(&mut *self.changes.lock())
    }

    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.lock().is_empty()
    }
}

impl<S: Snapshot> Default for PendingChanges<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_core::{ObserveResult, VersionedChange};

    struct Probe;

    impl Snapshot for Probe {
        type Version = u64;
        type Change = i32;

        fn version(&self) -> ObserveResult<u64> {
            Ok(0)
        }
    }

    #[test]
    fn test_take_preserves_order_and_clears() {
        let pending = PendingChanges::<Probe>::new();
        pending.push(VersionedChange::new(0, 1, 10));
        pending.push(VersionedChange::new(1, 2, 20));
        assert_eq!(pending.len(), 2);

        let batch = pending.take();
        assert_eq!(
            batch.iter().map(|c| c.change).collect::<Vec<_>>(),
            vec![10, 20]
        );
        assert!(pending.is_empty());
        assert!(pending.take().is_empty());
    }
}
