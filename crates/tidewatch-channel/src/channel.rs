//! Current-value channel implementation

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Value paired with the sequence number it was published under
pub type Sequenced<T> = (T, u64);

struct Cell<T> {
    /// Latest published value; sequence numbers start at 1
    latest: Option<Sequenced<T>>,
    finished: bool,
    /// Readers suspended until the next send; each resolved exactly once
    waiters: Vec<oneshot::Sender<Sequenced<T>>>,
}

struct Shared<T> {
    cell: Mutex<Cell<T>>,
}

impl<T: Clone> Shared<T> {
    async fn next_after(&self, after: u64) -> Option<Sequenced<T>> {
        let waiter = {
            let mut cell = self.cell.lock();
            if cell.finished {
                return None;
            }
            if let Some((value, seq)) = &cell.latest {
                if *seq > after {
                    return Some((value.clone(), *seq));
                }
            }

            let (tx, rx) = oneshot::channel();
            // Drop handles left behind by readers that gave up waiting
            cell.waiters.retain(|w| !w.is_closed());
            cell.waiters.push(tx);
            rx
        };

        // A dropped sender means finish (or the channel itself went away)
        waiter.await.ok()
    }
}

/// Publishing side of a latest-value broadcast
///
/// Dropping the channel finishes it.
pub struct CurrentValueChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> CurrentValueChannel<T> {
    pub fn new() -> Self {
        CurrentValueChannel {
            shared: Arc::new(Shared {
                cell: Mutex::new(Cell {
                    latest: None,
                    finished: false,
                    waiters: Vec::new(),
                }),
            }),
        }
    }

    /// Publish a value under the next sequence number
    ///
    /// Wakes every suspended reader. No-op after finish.
    pub fn send(&self, value: T) {
        let mut cell = self.shared.cell.lock();
        if cell.finished {
            return;
        }

        let seq = cell.latest.as_ref().map_or(0, |(_, seq)| *seq) + 1;
        for waiter in cell.waiters.drain(..) {
            // The reader may have been cancelled
            let _ = waiter.send((value.clone(), seq));
        }
        cell.latest = Some((value, seq));
    }

    /// First value published with a sequence greater than `after`
    ///
    /// Returns immediately if the held value qualifies, otherwise waits for the
    /// next send. `None` once the channel is finished.
    pub async fn next_after(&self, after: u64) -> Option<Sequenced<T>> {
        self.shared.next_after(after).await
    }

    /// Close the channel and release all waiting readers. Idempotent.
    pub fn finish(&self) {
        let mut cell = self.shared.cell.lock();
        cell.finished = true;
        cell.waiters.clear();
    }

    pub fn is_finished(&self) -> bool {
        self.shared.cell.lock().finished
    }

    /// Latest published value and its sequence number
    pub fn latest(&self) -> Option<Sequenced<T>> {
        self.shared.cell.lock().latest.clone()
    }

    /// Sequence number of the latest send, 0 before the first one
    pub fn sequence(&self) -> u64 {
        self.shared
            .cell
            .lock()
            .latest
            .as_ref()
            .map_or(0, |(_, seq)| *seq)
    }

    /// Attach a new reader with its cursor at 0
    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            shared: Arc::clone(&self.shared),
            cursor: 0,
        }
    }
}

impl<T: Clone> Default for CurrentValueChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for CurrentValueChannel<T> {
    fn drop(&mut self) {
        let mut cell = self.shared.cell.lock();
        cell.finished = true;
        cell.waiters.clear();
    }
}

impl<T> fmt::Debug for CurrentValueChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = self.shared.cell.lock();
        f.debug_struct("CurrentValueChannel")
            .field("sequence", &cell.latest.as_ref().map_or(0, |(_, seq)| *seq))
            .field("finished", &cell.finished)
            .field("waiters", &cell.waiters.len())
            .finish()
    }
}

/// Reading side of a [`CurrentValueChannel`]
///
/// Each subscription keeps its own cursor, so readers proceed at their own
/// pace without affecting each other.
#[derive(Clone)]
pub struct Subscription<T> {
    shared: Arc<Shared<T>>,
    cursor: u64,
}

impl<T: Clone> Subscription<T> {
    /// Next value after this reader's cursor, `None` once finished
    ///
    /// Cancel safe: dropping the future leaves the cursor untouched.
    pub async fn next(&mut self) -> Option<T> {
        let (value, seq) = self.shared.next_after(self.cursor).await?;
        self.cursor = seq;
        Some(value)
    }

    /// Sequence number of the last value delivered to this reader
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cursor", &self.cursor)
            .finish()
    }
}
