//! Tidewatch Core - Fundamental types and collaborator contracts
//!
//! This crate defines the types shared by the observation engine:
//! - Identifiers (AuthorId)
//! - Version ordering (Version, VersionVector)
//! - Versioned change records and their ordering against a held version
//! - Storage, snapshot and observer traits
//! - Error types

pub mod id;
pub mod version;
pub mod change;
pub mod storage;
pub mod error;

pub use id::*;
pub use version::*;
pub use change::*;
pub use storage::*;
pub use error::*;
