//! Tidewatch Test Harness - Fixtures and feed fuzzing
//!
//! This crate provides:
//! - A single-counter storage with fault injection
//! - A counter observer with injectable reducer failures
//! - Collectors and a settle helper for async tests
//! - Randomized change-feed scripts for convergence testing

pub mod counter;
pub mod harness;
pub mod feed_fuzzer;

pub use counter::*;
pub use harness::*;
pub use feed_fuzzer::*;
