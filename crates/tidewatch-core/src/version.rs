//! Version ordering model
//!
//! Every snapshot and every change carries a version. Versions are partially
//! ordered: two versions are either equal, one precedes the other, or they are
//! incomparable. `PartialOrd` carries exactly this relation, so `partial_cmp`
//! returning `None` means "incomparable".

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::AuthorId;

/// A comparable version tag attached to snapshots and changes.
///
/// Implementors must keep `partial_cmp` consistent with `==`: it returns
/// `Some(Ordering::Equal)` exactly when the two versions are equal.
pub trait Version: Clone + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Two versions are compatible if they are equal or one strictly precedes the other
    fn is_compatible(&self, other: &Self) -> bool {
        self == other || self < other || self > other
    }
}

/// Plain sequence numbers form a total order, so every pair is compatible
impl Version for u64 {}

/// Version vector for causal ordering (not total ordering)
///
/// Zero entries are never stored, so a missing author and an author at clock 0
/// compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionVector {
    clocks: HashMap<AuthorId, u64>,
}

impl VersionVector {
    pub fn new() -> Self {
        VersionVector {
            clocks: HashMap::new(),
        }
    }

    /// Get the clock value for an author
    #[inline]
    pub fn get(&self, author: AuthorId) -> u64 {
        self.clocks.get(&author).copied().unwrap_or(0)
    }

    /// Increment the clock for an author
    pub fn increment(&mut self, author: AuthorId) {
        *self.clocks.entry(author).or_insert(0) += 1;
    }

    /// Set the clock for an author
    pub fn set(&mut self, author: AuthorId, value: u64) {
        if value == 0 {
            self.clocks.remove(&author);
        } else {
            self.clocks.insert(author, value);
        }
    }

    /// Check if self happens-before other
    pub fn happens_before(&self, other: &VersionVector) -> bool {
        if self == other {
            return false;
        }

        // self ≤ other for all authors, and strictly < for at least one
        let mut strictly_less = false;

        for (author, &clock) in &self.clocks {
            let other_clock = other.get(*author);
            if clock > other_clock {
                return false;
            }
            if clock < other_clock {
                strictly_less = true;
            }
        }

        // Authors in other but not in self
        for author in other.clocks.keys() {
            if !self.clocks.contains_key(author) {
                strictly_less = true;
            }
        }

        strictly_less
    }

    /// Check if two version vectors are concurrent (neither happens-before)
    pub fn concurrent(&self, other: &VersionVector) -> bool {
        !self.happens_before(other) && !other.happens_before(self) && self != other
    }

    /// Number of authors with a non-zero clock
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// Compact representation, sorted by author
    pub fn to_compact(&self) -> Vec<(AuthorId, u64)> {
        let mut entries: Vec<_> = self.clocks.iter().map(|(&a, &c)| (a, c)).collect();
        entries.sort_unstable_by_key(|(author, _)| *author);
        entries
    }

    /// Restore from compact representation
    pub fn from_compact(entries: Vec<(AuthorId, u64)>) -> Self {
        VersionVector {
            clocks: entries.into_iter().filter(|(_, clock)| *clock > 0).collect(),
        }
    }
}

impl PartialOrd for VersionVector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else if self.happens_before(other) {
            Some(Ordering::Less)
        } else if other.happens_before(self) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

impl fmt::Display for VersionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (author, clock)) in self.to_compact().into_iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", author.0, clock)?;
        }
        write!(f, "]")
    }
}

impl Version for VersionVector {}
