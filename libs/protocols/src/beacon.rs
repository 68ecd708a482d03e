//! The common-coin beacon functionality.
//!
//! An ideal functionality hosted by the harness: the first `f + 1` distinct
//! requesters of an index trigger sampling of a fresh uniform field element,
//! which is then handed to every past and future requester of that index.
//! The released map is append-only; an index's value never changes.

use crate::{
    envelope::{Envelope, Origin, Payload},
    session::SessionId,
};
use basic_types::PartyId;
use math_lib::modular::ModularNumber;
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use std::collections::{BTreeMap, BTreeSet};

/// The beacon state: requester sets and released values per index.
pub struct Beacon {
    threshold: usize,
    rng: ChaCha20Rng,
    requesters: BTreeMap<SessionId, BTreeSet<PartyId>>,
    values: BTreeMap<SessionId, ModularNumber>,
    samples: u64,
}

impl Beacon {
    /// Constructs a beacon releasing values at the given requester threshold.
    pub fn new(threshold: usize, rng: ChaCha20Rng) -> Self {
        Self { threshold, rng, requesters: BTreeMap::new(), values: BTreeMap::new(), samples: 0 }
    }

    /// Handles one request, returning the value envelopes to deliver.
    pub fn handle_request(
        &mut self,
        index: SessionId,
        requester: PartyId,
    ) -> Vec<(PartyId, Envelope)> {
        if let Some(value) = self.values.get(&index) {
            return vec![Self::value_envelope(&index, requester, value)];
        }
        self.requesters.entry(index.clone()).or_default().insert(requester);
        let requesters = &self.requesters[&index];
        if requesters.len() < self.threshold {
            return Vec::new();
        }
        let value = ModularNumber::gen_random(&mut self.rng);
        self.samples += 1;
        let deliveries = requesters
            .iter()
            .map(|party| Self::value_envelope(&index, *party, &value))
            .collect();
        self.values.insert(index, value);
        deliveries
    }

    fn value_envelope(
        index: &SessionId,
        party: PartyId,
        value: &ModularNumber,
    ) -> (PartyId, Envelope) {
        let envelope = Envelope {
            origin: Origin::Beacon,
            session: index.clone(),
            payload: Payload::BeaconValue(value.encode()),
        };
        (party, envelope)
    }

    /// How many values were sampled so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    fn beacon() -> Beacon {
        Beacon::new(2, ChaCha20Rng::seed_from_u64(1))
    }

    fn index(name: &str) -> SessionId {
        SessionId::root("ba").child(name)
    }

    #[test]
    fn below_threshold_nothing_is_released() {
        let mut beacon = beacon();
        assert!(beacon.handle_request(index("coin-1"), PartyId::new(1)).is_empty());
        // The same requester again does not move the count.
        assert!(beacon.handle_request(index("coin-1"), PartyId::new(1)).is_empty());
        assert_eq!(beacon.samples(), 0);
    }

    #[test]
    fn threshold_releases_to_all_requesters() {
        let mut beacon = beacon();
        beacon.handle_request(index("coin-1"), PartyId::new(2));
        let deliveries = beacon.handle_request(index("coin-1"), PartyId::new(3));
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].1.payload, deliveries[1].1.payload);
        assert_eq!(beacon.samples(), 1);
    }

    #[test]
    fn late_requesters_get_the_chosen_value() {
        let mut beacon = beacon();
        beacon.handle_request(index("coin-1"), PartyId::new(1));
        let released = beacon.handle_request(index("coin-1"), PartyId::new(2));
        let late = beacon.handle_request(index("coin-1"), PartyId::new(4));
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].0, PartyId::new(4));
        assert_eq!(late[0].1.payload, released[0].1.payload);
        assert_eq!(beacon.samples(), 1);
    }

    #[test]
    fn distinct_indices_get_independent_values() {
        let mut beacon = beacon();
        beacon.handle_request(index("coin-1"), PartyId::new(1));
        let first = beacon.handle_request(index("coin-1"), PartyId::new(2));
        beacon.handle_request(index("coin-2"), PartyId::new(1));
        let second = beacon.handle_request(index("coin-2"), PartyId::new(2));
        assert_eq!(beacon.samples(), 2);
        assert_ne!(first[0].1.session, second[0].1.session);
    }
}
