//! Identity types

use std::fmt;

/// Author identity - the writer whose clock a version vector entry tracks
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AuthorId(pub u64);

impl AuthorId {
    pub const ZERO: AuthorId = AuthorId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        AuthorId(id)
    }
}

impl fmt::Debug for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Author({:016x})", self.0)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_id_formatting() {
        let id = AuthorId::new(0xabc);
        assert_eq!(format!("{}", id), "0000000000000abc");
        assert_eq!(format!("{:?}", id), "Author(0000000000000abc)");
        assert_eq!(AuthorId::default(), AuthorId::ZERO);
    }
}
