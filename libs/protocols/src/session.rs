//! Hierarchical protocol session identifiers.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A hierarchical identifier locating one protocol instance within a party.
///
/// Ids form a path, e.g. `auction/gt-1-2/bit-3/acs/ba-2`. Every envelope
/// carries the id of the instance it targets, and instances derive the ids
/// of their sub-protocols with [`SessionId::child`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// A new top-level session.
    pub fn root(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives the id of a sub-protocol session.
    pub fn child(&self, segment: impl Display) -> Self {
        Self(format!("{}/{}", self.0, segment))
    }

    /// The id as a path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn child_derivation_nests() {
        let root = SessionId::root("auction");
        let ba = root.child("acs").child("ba-3");
        assert_eq!(ba.as_str(), "auction/acs/ba-3");
    }

    #[test]
    fn ids_are_comparable() {
        let a = SessionId::root("auction").child("mul-1");
        let b = SessionId::root("auction").child("mul-1");
        assert_eq!(a, b);
    }
}
