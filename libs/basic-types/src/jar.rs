//! A collector for at most one element per party.

use crate::party::PartyId;

/// A jar where every party may put exactly one element.
///
/// Quorum-style protocols complete once *enough* entries exist, so unlike a
/// plain map this type exposes counting queries over partial contents. The
/// stored elements are kept sorted by party id.
#[derive(Debug, Clone, Default)]
pub struct PartyJar<T> {
    elements: Vec<(PartyId, T)>,
}

impl<T> PartyJar<T> {
    /// Constructs an empty jar.
    pub fn new() -> Self {
        Self { elements: Vec::new() }
    }

    /// Adds an element for a party.
    ///
    /// Returns an error if the party already provided one; quorum logic
    /// treats duplicates as idempotent re-delivery and ignores them.
    pub fn add_element(&mut self, party: PartyId, element: T) -> Result<(), DuplicatePartyElement> {
        match self.elements.binary_search_by(|entry| entry.0.cmp(&party)) {
            Ok(_) => Err(DuplicatePartyElement(party)),
            Err(index) => {
                self.elements.insert(index, (party, element));
                Ok(())
            }
        }
    }

    /// Whether the party already contributed.
    pub fn contains(&self, party: &PartyId) -> bool {
        self.elements.binary_search_by(|entry| entry.0.cmp(party)).is_ok()
    }

    /// The element contributed by a party, if any.
    pub fn get(&self, party: &PartyId) -> Option<&T> {
        self.elements
            .binary_search_by(|entry| entry.0.cmp(party))
            .ok()
            .map(|index| &self.elements[index].1)
    }

    /// How many parties contributed.
    pub fn stored_party_count(&self) -> usize {
        self.elements.len()
    }

    /// The stored elements, sorted by party id.
    pub fn elements(&self) -> impl Iterator<Item = &(PartyId, T)> {
        self.elements.iter()
    }

    /// Consumes the jar, yielding elements sorted by party id.
    pub fn into_elements(self) -> impl Iterator<Item = (PartyId, T)> {
        self.elements.into_iter()
    }
}

impl<T: PartialEq> PartyJar<T> {
    /// How many stored elements equal the given one.
    pub fn matching_count(&self, element: &T) -> usize {
        self.elements.iter().filter(|(_, stored)| stored == element).count()
    }
}

/// A party attempted to contribute twice.
#[derive(Debug, thiserror::Error)]
#[error("party {0} already provided an element")]
pub struct DuplicatePartyElement(pub PartyId);
