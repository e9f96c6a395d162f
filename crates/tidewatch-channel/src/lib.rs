//! Tidewatch Channel - Latest-value broadcast
//!
//! A [`CurrentValueChannel`] holds the most recently published value and its
//! sequence number. Any number of [`Subscription`]s read from it, each with its
//! own cursor:
//! - a reader never sees a value twice or out of order
//! - a reader attaching late starts at the latest value
//! - a slow reader skips values that were superseded while it was busy
//! - `finish` (or dropping the channel) releases every waiting reader

pub mod channel;

pub use channel::*;
