//! Collaborator contracts
//!
//! The observation engine never implements storage or decides what a change
//! means. It consumes a [`Storage`] for snapshots and the change feed, and a
//! [`StorageObserver`] that derives and maintains one output.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{ObserveResult, Version, VersionedChange};

/// A consistent view of storage content
pub trait Snapshot {
    type Version: Version;
    type Change: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Version of this snapshot; may fail if the snapshot is inconsistent
    fn version(&self) -> ObserveResult<Self::Version>;
}

/// Version type of a snapshot
pub type SnapshotVersion<S> = <S as Snapshot>::Version;

/// Change payload type of a snapshot
pub type SnapshotChange<S> = <S as Snapshot>::Change;

/// Versioned change record emitted for a snapshot type
pub type ChangeRecord<S> = VersionedChange<SnapshotVersion<S>, SnapshotChange<S>>;

/// Push-based change feed. It ends only when the storage drops its sender.
pub type ChangeFeed<S> = mpsc::UnboundedReceiver<ChangeRecord<S>>;

/// Storage backend seen from the observer's side
pub trait Storage: Send + Sync + 'static {
    type Snapshot: Snapshot;

    /// Subscribe to the change feed
    fn changes(&self) -> ChangeFeed<Self::Snapshot>;

    /// Run `body` against a consistent snapshot
    ///
    /// Failure to acquire the snapshot and failures of `body` are both surfaced.
    fn with_snapshot<T, F>(&self, body: F) -> impl Future<Output = ObserveResult<T>> + Send
    where
        T: Send + 'static,
        F: FnOnce(&Self::Snapshot) -> ObserveResult<T> + Send + 'static;
}

/// Shared storages are storages too, so several observations can watch one backend
impl<S: Storage> Storage for Arc<S> {
    type Snapshot = S::Snapshot;

    fn changes(&self) -> ChangeFeed<Self::Snapshot> {
        (**self).changes()
    }

    fn with_snapshot<T, F>(&self, body: F) -> impl Future<Output = ObserveResult<T>> + Send
    where
        T: Send + 'static,
        F: FnOnce(&Self::Snapshot) -> ObserveResult<T> + Send + 'static,
    {
        (**self).with_snapshot(body)
    }
}

/// Per-use-case reconciliation strategy
pub trait StorageObserver: Send + Sync + 'static {
    type Snapshot: Snapshot;
    type Output: Clone + Send + Sync + 'static;

    /// Derive the output from a full snapshot
    fn fetch(&self, snapshot: &Self::Snapshot) -> ObserveResult<Self::Output>;

    /// Whether a change can affect the output at all
    fn is_relevant(&self, change: &SnapshotChange<Self::Snapshot>) -> bool;

    /// Apply a relevant change in place.
    ///
    /// Return [`ObserveError::RetryAfter`](crate::ObserveError::RetryAfter) to
    /// request a re-fetch after a specific delay.
    fn reduce(
        &self,
        output: &mut Self::Output,
        change: &SnapshotChange<Self::Snapshot>,
    ) -> ObserveResult<()>;

    /// Output shown to consumers before any fetch has completed
    fn initial_value(&self) -> Self::Output;
}
