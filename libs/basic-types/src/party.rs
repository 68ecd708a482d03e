//! Party identifiers and sender-tagged messages.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};

/// A 1-based party identifier.
///
/// The index doubles as the party's Shamir abscissa, so it is never zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartyId(u8);

impl PartyId {
    /// Constructs a party id from its 1-based index.
    pub fn new(index: u8) -> Self {
        debug_assert!(index > 0, "party indices are 1-based");
        Self(index)
    }

    /// The 1-based index.
    pub fn index(&self) -> u8 {
        self.0
    }

    /// The index widened for arithmetic use.
    pub fn as_u64(&self) -> u64 {
        u64::from(self.0)
    }

    /// All party ids for a network of the given size.
    pub fn all(count: u8) -> Vec<PartyId> {
        (1..=count).map(PartyId::new).collect()
    }
}

impl Display for PartyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl Debug for PartyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PartyId({})", self.0)
    }
}

/// A message tagged with the party that sent it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartyMessage<T> {
    /// The sender party id.
    pub sender: PartyId,

    /// The message itself.
    pub message: T,
}

impl<T> PartyMessage<T> {
    /// Constructs a new party message.
    pub fn new(sender: PartyId, message: T) -> Self {
        Self { sender, message }
    }

    /// Decomposes this message into its sender and payload.
    pub fn into_parts(self) -> (PartyId, T) {
        (self.sender, self.message)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn party_ids_are_ordered_by_index() {
        let parties = PartyId::all(4);
        assert_eq!(parties.len(), 4);
        assert!(parties.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(parties[2].index(), 3);
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(PartyId::new(2).to_string(), "P2");
    }
}
