//! Tidewatch Observe - Storage observation engine
//!
//! This crate keeps one derived output in step with a storage:
//! 1. Fetch an initial snapshot (with exponential backoff)
//! 2. Buffer versioned changes from the storage's feed
//! 3. Reconcile buffered changes in batches, publishing one output per batch
//! 4. Recover from version gaps and reducer failures with a delayed re-fetch
//! 5. Pause and resume without missing a required re-fetch

pub mod binding;
pub mod clock;
pub mod config;
pub mod events;
pub mod observation;
pub mod pending;
pub mod state;

pub use binding::*;
pub use clock::*;
pub use config::*;
pub use events::*;
pub use observation::*;
pub use pending::*;
pub use state::*;
