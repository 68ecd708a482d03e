//! The Shamir secret sharer bound to a fixed party set.

use crate::errors::{RecoverSecretError, ShamirError};
use basic_types::PartyId;
use math_lib::{
    lagrange::{lagrange_at_zero, lagrange_polynomial},
    modular::ModularNumber,
    polynomial::{Point, Polynomial},
};
use rand::Rng;
use rustc_hash::FxHashMap;

/// Shares generated for a set of parties.
pub type PartyShares<T> = FxHashMap<PartyId, T>;

/// Degree of a generated polynomial.
#[derive(Clone, Copy, Debug)]
pub enum PolyDegree {
    /// Degree equal to the configured fault threshold.
    T,

    /// Double degree, as produced by a local share product.
    TwoT,
}

/// A Shamir secret sharer over the fixed party set.
///
/// Party indices double as evaluation abscissas, so shares for party `j` are
/// evaluations at `x = j` and the secret sits at `x = 0`.
#[derive(Clone)]
pub struct ShamirSecretSharer {
    local_party_id: PartyId,
    polynomial_degree: usize,
    parties: Vec<PartyId>,
}

impl ShamirSecretSharer {
    /// Constructs a new sharer.
    ///
    /// `polynomial_degree` is the fault threshold `f`; reconstruction needs
    /// `f + 1` of the generated shares.
    pub fn new(
        local_party_id: PartyId,
        polynomial_degree: usize,
        parties: Vec<PartyId>,
    ) -> Result<Self, ShamirError> {
        if polynomial_degree >= parties.len() {
            return Err(ShamirError::TooHighDegree);
        }
        let mut sorted = parties.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != parties.len() {
            return Err(ShamirError::DuplicateParty);
        }
        Ok(Self { local_party_id, polynomial_degree, parties: sorted })
    }

    /// Our own party id.
    pub fn local_party_id(&self) -> PartyId {
        self.local_party_id
    }

    /// The parties shares are generated for, in index order.
    pub fn parties(&self) -> &[PartyId] {
        &self.parties
    }

    /// The number of parties.
    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    /// The configured polynomial degree.
    pub fn polynomial_degree(&self) -> usize {
        self.polynomial_degree
    }

    /// The number of shares needed to reconstruct a degree-`f` sharing.
    pub fn recovery_threshold(&self) -> usize {
        self.polynomial_degree + 1
    }

    /// The evaluation abscissa of a party.
    pub fn abscissa(&self, party: PartyId) -> ModularNumber {
        ModularNumber::from_u64(party.as_u64())
    }

    /// Generates one share per party for the given secret.
    pub fn generate_shares<R: Rng>(
        &self,
        secret: &ModularNumber,
        degree: PolyDegree,
        rng: &mut R,
    ) -> PartyShares<ModularNumber> {
        let degree = match degree {
            PolyDegree::T => self.polynomial_degree,
            PolyDegree::TwoT => self.polynomial_degree * 2,
        };
        let polynomial = Polynomial::gen_random(degree, *secret, rng);
        let mut shares = PartyShares::default();
        for party in &self.parties {
            shares.insert(*party, polynomial.eval(&self.abscissa(*party)));
        }
        shares
    }

    /// Recovers a secret from any `f + 1` (or more) shares.
    pub fn recover<I>(&self, shares: I) -> Result<ModularNumber, RecoverSecretError>
    where
        I: IntoIterator<Item = (PartyId, ModularNumber)>,
    {
        let points = self.to_points(shares)?;
        Ok(lagrange_at_zero(&points)?)
    }

    /// Recovers the full sharing polynomial from any `f + 1` shares.
    ///
    /// Used by the dissemination layer to evaluate missing shares and to
    /// check additional evidence for consistency.
    pub fn recover_polynomial<I>(&self, shares: I) -> Result<Polynomial, RecoverSecretError>
    where
        I: IntoIterator<Item = (PartyId, ModularNumber)>,
    {
        let points = self.to_points(shares)?;
        Ok(lagrange_polynomial(&points)?)
    }

    fn to_points<I>(&self, shares: I) -> Result<Vec<Point>, RecoverSecretError>
    where
        I: IntoIterator<Item = (PartyId, ModularNumber)>,
    {
        let mut points: Vec<_> = shares
            .into_iter()
            .map(|(party, share)| Point::new(self.abscissa(party), share))
            .collect();
        points.sort_by(|a, b| a.x.cmp(&b.x));
        if points.len() < self.recovery_threshold() {
            return Err(RecoverSecretError::NotEnoughShares {
                required: self.recovery_threshold(),
                found: points.len(),
            });
        }
        Ok(points)
    }
}

#[allow(clippy::arithmetic_side_effects)]
#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use rstest::rstest;

    fn make_sharer() -> ShamirSecretSharer {
        ShamirSecretSharer::new(PartyId::new(1), 1, PartyId::all(4)).unwrap()
    }

    #[rstest]
    #[case(0)]
    #[case(31)]
    #[case(123456789)]
    fn share_then_recover(#[case] secret: u64) {
        let sharer = make_sharer();
        let mut rng = ChaCha20Rng::seed_from_u64(secret);
        let secret = ModularNumber::from_u64(secret);
        let shares = sharer.generate_shares(&secret, PolyDegree::T, &mut rng);
        assert_eq!(shares.len(), 4);

        // Any two shares suffice for a degree-1 sharing.
        let subset = [PartyId::new(2), PartyId::new(4)].map(|party| (party, shares[&party]));
        assert_eq!(sharer.recover(subset).unwrap(), secret);

        // So does the full set.
        assert_eq!(sharer.recover(shares).unwrap(), secret);
    }

    #[test]
    fn too_few_shares_fail() {
        let sharer = make_sharer();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let shares =
            sharer.generate_shares(&ModularNumber::from_u32(9), PolyDegree::T, &mut rng);
        let one = [(PartyId::new(1), shares[&PartyId::new(1)])];
        assert!(matches!(
            sharer.recover(one),
            Err(RecoverSecretError::NotEnoughShares { required: 2, found: 1 })
        ));
    }

    #[test]
    fn double_degree_needs_three_shares() {
        let sharer = make_sharer();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let secret = ModularNumber::from_u32(21);
        let shares = sharer.generate_shares(&secret, PolyDegree::TwoT, &mut rng);
        let subset: Vec<_> =
            [1u8, 2, 4].map(PartyId::new).into_iter().map(|party| (party, shares[&party])).collect();
        assert_eq!(sharer.recover(subset).unwrap(), secret);
    }

    #[test]
    fn recovered_polynomial_evaluates_missing_share() {
        let sharer = make_sharer();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let secret = ModularNumber::from_u32(17);
        let shares = sharer.generate_shares(&secret, PolyDegree::T, &mut rng);
        let subset = [PartyId::new(1), PartyId::new(3)].map(|party| (party, shares[&party]));
        let polynomial = sharer.recover_polynomial(subset).unwrap();
        assert_eq!(polynomial.eval(&sharer.abscissa(PartyId::new(2))), shares[&PartyId::new(2)]);
        assert_eq!(polynomial.eval(&ModularNumber::ZERO), secret);
    }

    #[test]
    fn local_product_of_shares_is_a_double_degree_sharing() {
        let sharer = make_sharer();
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let left = ModularNumber::from_u32(7);
        let right = ModularNumber::from_u32(3);
        let left_shares = sharer.generate_shares(&left, PolyDegree::T, &mut rng);
        let right_shares = sharer.generate_shares(&right, PolyDegree::T, &mut rng);
        let products = sharer
            .parties()
            .iter()
            .map(|party| (*party, left_shares[party] * &right_shares[party]))
            .collect::<Vec<_>>();
        // Three points pin the degree-2 product polynomial.
        assert_eq!(sharer.recover(products[..3].to_vec()).unwrap(), left * right);
    }

    #[test]
    fn degree_must_leave_room() {
        assert!(matches!(
            ShamirSecretSharer::new(PartyId::new(1), 4, PartyId::all(4)),
            Err(ShamirError::TooHighDegree)
        ));
    }
}
