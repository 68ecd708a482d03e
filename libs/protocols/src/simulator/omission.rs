//! Outbound omission policies.

use crate::envelope::MessageKind;
use basic_types::PartyId;
use rand::Rng;

/// Which outbound messages the designated faulty party silently drops.
///
/// Applied at the transport, never inside party logic: the omitter itself
/// does not know its messages are being discarded.
#[derive(Clone, Debug)]
pub enum OmissionPolicy {
    /// Drop everything the party sends.
    DropAll {
        /// The faulty party.
        party: PartyId,
    },

    /// Drop each message independently with the given probability.
    DropProb {
        /// The faulty party.
        party: PartyId,
        /// The drop probability in `[0, 1]`.
        probability: f64,
    },

    /// Drop only the listed message types.
    DropTypes {
        /// The faulty party.
        party: PartyId,
        /// The dropped types.
        kinds: Vec<MessageKind>,
    },

    /// Drop everything sent during the listed virtual-time intervals.
    BurstDrop {
        /// The faulty party.
        party: PartyId,
        /// Half-open `[start, end)` intervals in microseconds.
        intervals: Vec<(u64, u64)>,
    },
}

impl OmissionPolicy {
    /// The party this policy makes faulty.
    pub fn party(&self) -> PartyId {
        match self {
            OmissionPolicy::DropAll { party }
            | OmissionPolicy::DropProb { party, .. }
            | OmissionPolicy::DropTypes { party, .. }
            | OmissionPolicy::BurstDrop { party, .. } => *party,
        }
    }

    /// Whether one outbound message is dropped.
    pub fn should_drop<R: Rng>(
        &self,
        sender: PartyId,
        kind: MessageKind,
        now_micros: u64,
        rng: &mut R,
    ) -> bool {
        if sender != self.party() {
            return false;
        }
        match self {
            OmissionPolicy::DropAll { .. } => true,
            OmissionPolicy::DropProb { probability, .. } => rng.gen::<f64>() < *probability,
            OmissionPolicy::DropTypes { kinds, .. } => kinds.contains(&kind),
            OmissionPolicy::BurstDrop { intervals, .. } => intervals
                .iter()
                .any(|(start, end)| (*start..*end).contains(&now_micros)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn only_the_designated_party_is_affected() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let policy = OmissionPolicy::DropAll { party: PartyId::new(2) };
        assert!(policy.should_drop(PartyId::new(2), MessageKind::CssShare, 0, &mut rng));
        assert!(!policy.should_drop(PartyId::new(1), MessageKind::CssShare, 0, &mut rng));
    }

    #[test]
    fn drop_types_filters_by_kind() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let policy = OmissionPolicy::DropTypes {
            party: PartyId::new(3),
            kinds: vec![MessageKind::BaVote, MessageKind::BaDecide],
        };
        assert!(policy.should_drop(PartyId::new(3), MessageKind::BaVote, 5, &mut rng));
        assert!(!policy.should_drop(PartyId::new(3), MessageKind::RbcEcho, 5, &mut rng));
    }

    #[test]
    fn burst_drop_is_time_scoped() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let policy = OmissionPolicy::BurstDrop {
            party: PartyId::new(1),
            intervals: vec![(100, 200), (400, 500)],
        };
        assert!(!policy.should_drop(PartyId::new(1), MessageKind::MpcOpen, 99, &mut rng));
        assert!(policy.should_drop(PartyId::new(1), MessageKind::MpcOpen, 150, &mut rng));
        assert!(!policy.should_drop(PartyId::new(1), MessageKind::MpcOpen, 200, &mut rng));
        assert!(policy.should_drop(PartyId::new(1), MessageKind::MpcOpen, 450, &mut rng));
    }
}
