//! Pre-dealt random bit sharings.
//!
//! The comparison gates consume shared random bits for their masked opens.
//! Producing such bits inside the protocol needs a preprocessing phase of
//! its own, which stays outside the core: the harness acts as a trusted
//! dealer and hands every party its bank of bit shares before the run
//! starts, deterministically from the scenario seed.

use crate::config::ProtocolConfig;
use basic_types::PartyId;
use math_lib::modular::ModularNumber;
use rand::Rng;
use shamir_sharing::{PolyDegree, ShamirSecretSharer};
use std::collections::BTreeMap;

/// Bits of a bid.
pub const BID_BITS: usize = 5;

/// Extra uniform bits that statistically hide a masked open.
pub const STAT_SEC_BITS: usize = 40;

/// Bits per comparison mask bundle.
pub const MASK_BITS: usize = BID_BITS + 1 + STAT_SEC_BITS;

/// One party's shares of every pre-dealt random bit.
///
/// Bundles are keyed by the unordered pair of parties whose comparison gate
/// consumes them, so every party draws the same bundle for the same gate.
#[derive(Clone, Debug, Default)]
pub struct RandomBitBank {
    bundles: BTreeMap<(PartyId, PartyId), Vec<ModularNumber>>,
}

impl RandomBitBank {
    /// Our shares of the mask bits for the comparison of `a` and `b`, least
    /// significant bit first.
    pub fn bundle(&self, a: PartyId, b: PartyId) -> Option<&[ModularNumber]> {
        let key = if a <= b { (a, b) } else { (b, a) };
        self.bundles.get(&key).map(Vec::as_slice)
    }
}

/// Deals every party's bank for all pairwise comparison gates.
pub fn deal_banks<R: Rng>(
    config: &ProtocolConfig,
    rng: &mut R,
) -> Result<BTreeMap<PartyId, RandomBitBank>, shamir_sharing::ShamirError> {
    let parties = config.parties().to_vec();
    let sharer =
        ShamirSecretSharer::new(parties[0], config.fault_threshold(), parties.clone())?;
    let mut banks: BTreeMap<PartyId, RandomBitBank> =
        parties.iter().map(|party| (*party, RandomBitBank::default())).collect();
    for (index, a) in parties.iter().enumerate() {
        for b in parties.iter().skip(index + 1) {
            for _ in 0..MASK_BITS {
                let bit = if rng.gen::<bool>() { ModularNumber::ONE } else { ModularNumber::ZERO };
                let shares = sharer.generate_shares(&bit, PolyDegree::T, rng);
                for party in &parties {
                    if let (Some(bank), Some(share)) = (banks.get_mut(party), shares.get(party)) {
                        bank.bundles.entry((*a, *b)).or_default().push(*share);
                    }
                }
            }
        }
    }
    Ok(banks)
}

#[allow(clippy::arithmetic_side_effects)]
#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn config() -> ProtocolConfig {
        ProtocolConfig::new(PartyId::all(4), 1)
    }

    #[test]
    fn every_pair_gets_a_full_bundle() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let banks = deal_banks(&config(), &mut rng).unwrap();
        assert_eq!(banks.len(), 4);
        for bank in banks.values() {
            for (a, b) in [(1u8, 2u8), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)] {
                let bundle = bank.bundle(PartyId::new(a), PartyId::new(b)).unwrap();
                assert_eq!(bundle.len(), MASK_BITS);
            }
        }
    }

    #[test]
    fn bundle_lookup_ignores_pair_order() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let banks = deal_banks(&config(), &mut rng).unwrap();
        let bank = &banks[&PartyId::new(1)];
        assert_eq!(
            bank.bundle(PartyId::new(3), PartyId::new(2)),
            bank.bundle(PartyId::new(2), PartyId::new(3)),
        );
    }

    #[test]
    fn shares_reconstruct_to_bits() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let banks = deal_banks(&config(), &mut rng).unwrap();
        let sharer =
            ShamirSecretSharer::new(PartyId::new(1), 1, PartyId::all(4)).unwrap();
        let pair = (PartyId::new(2), PartyId::new(4));
        for index in 0..MASK_BITS {
            let shares: Vec<_> = PartyId::all(4)
                .into_iter()
                .map(|party| (party, banks[&party].bundle(pair.0, pair.1).unwrap()[index]))
                .collect();
            let bit = sharer.recover(shares).unwrap();
            assert!(bit == ModularNumber::ZERO || bit == ModularNumber::ONE);
        }
    }

    #[test]
    fn dealing_is_deterministic_per_seed() {
        let banks_a = deal_banks(&config(), &mut ChaCha20Rng::seed_from_u64(8)).unwrap();
        let banks_b = deal_banks(&config(), &mut ChaCha20Rng::seed_from_u64(8)).unwrap();
        let party = PartyId::new(3);
        assert_eq!(
            banks_a[&party].bundle(PartyId::new(1), PartyId::new(2)),
            banks_b[&party].bundle(PartyId::new(1), PartyId::new(2)),
        );
    }
}
