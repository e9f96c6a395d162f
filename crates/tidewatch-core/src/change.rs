//! Versioned change records

use crate::Version;

/// "The storage moved from `old_version` to `new_version`, and the delta was `change`."
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedChange<V, C> {
    pub old_version: V,
    pub new_version: V,
    pub change: C,
}

/// How a change relates to the version an observer currently holds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrdering {
    /// Already reflected in the held version (`new_version <= held`)
    Stale,
    /// Starts exactly at the held version and may be applied
    Consistent,
    /// Neither stale nor starting at the held version; must not be applied
    Misaligned,
}

impl<V: Version, C> VersionedChange<V, C> {
    pub fn new(old_version: V, new_version: V, change: C) -> Self {
        VersionedChange {
            old_version,
            new_version,
            change,
        }
    }

    /// Check if the change has already been applied at `current`
    #[inline]
    pub fn is_stale(&self, current: &V) -> bool {
        self.new_version < *current || self.new_version == *current
    }

    /// Check if the change starts at `current`
    #[inline]
    pub fn is_consistent_with(&self, current: &V) -> bool {
        self.old_version == *current
    }

    /// Classify the change against the held version
    pub fn ordering(&self, current: &V) -> ChangeOrdering {
        if self.is_stale(current) {
            ChangeOrdering::Stale
        } else if self.is_consistent_with(current) {
            ChangeOrdering::Consistent
        } else {
            ChangeOrdering::Misaligned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthorId, VersionVector};

    #[test]
    fn test_sequence_ordering() {
        let change = VersionedChange::new(3u64, 4u64, "delta");

        assert_eq!(change.ordering(&3), ChangeOrdering::Consistent);
        assert_eq!(change.ordering(&4), ChangeOrdering::Stale);
        assert_eq!(change.ordering(&7), ChangeOrdering::Stale);
        assert_eq!(change.ordering(&2), ChangeOrdering::Misaligned);
    }

    #[test]
    fn test_concurrent_vector_is_misaligned() {
        let author_a = AuthorId::new(1);
        let author_b = AuthorId::new(2);

        let mut held = VersionVector::new();
        held.increment(author_a);

        let mut old = VersionVector::new();
        old.increment(author_b);
        let mut new = old.clone();
        new.increment(author_b);

        // Neither stale nor starting at the held vector
        let change = VersionedChange::new(old, new, ());
        assert_eq!(change.ordering(&held), ChangeOrdering::Misaligned);
    }

    #[test]
    fn test_stale_takes_precedence_over_consistency() {
        // A no-op change whose new version equals the held one is skipped
        let change = VersionedChange::new(5u64, 5u64, ());
        assert_eq!(change.ordering(&5), ChangeOrdering::Stale);
    }
}
