//! Residues modulo the Mersenne prime `p = 2^127 - 1`.

use crate::errors::{DecodeError, DivByZero};
use crypto_bigint::{Encoding, U128};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{Add, Mul, Neg, Sub},
};

/// The prime modulus. Being a Mersenne prime, reduction after a widening
/// multiply is two fold-and-add passes.
pub const MODULO: u128 = (1u128 << 127) - 1;

/// An element of `F_p` with `p = 2^127 - 1`.
///
/// The inner residue is always canonical (strictly below the modulus).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModularNumber(u128);

impl ModularNumber {
    /// The additive identity.
    pub const ZERO: ModularNumber = ModularNumber(0);

    /// The multiplicative identity.
    pub const ONE: ModularNumber = ModularNumber(1);

    /// Construct an element from an integer, reducing it.
    pub fn new(value: u128) -> Self {
        // One fold handles anything below 2^128: 2^127 ≡ 1 (mod p).
        let folded = (value & MODULO) + (value >> 127);
        Self(reduce_once(folded))
    }

    /// Construct an element from a small integer.
    pub fn from_u64(value: u64) -> Self {
        Self(u128::from(value))
    }

    /// Construct an element from a small integer.
    pub fn from_u32(value: u32) -> Self {
        Self(u128::from(value))
    }

    /// The canonical residue.
    pub fn into_value(self) -> u128 {
        self.0
    }

    /// Whether this is the additive identity.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Modular exponentiation by square-and-multiply.
    pub fn pow(&self, mut exponent: u128) -> Self {
        let mut base = *self;
        let mut result = Self::ONE;
        while exponent != 0 {
            if exponent & 1 == 1 {
                result = result * &base;
            }
            base = base * &base;
            exponent >>= 1;
        }
        result
    }

    /// The multiplicative inverse, via Fermat's little theorem.
    pub fn inv(&self) -> Result<Self, DivByZero> {
        if self.is_zero() {
            return Err(DivByZero);
        }
        Ok(self.pow(MODULO - 2))
    }

    /// Sample a uniform element.
    pub fn gen_random<R: Rng>(rng: &mut R) -> Self {
        // Masking to 127 bits leaves a single non-canonical value (p itself)
        // to reject, so the loop terminates almost immediately.
        loop {
            let candidate = rng.gen::<u128>() & MODULO;
            if candidate < MODULO {
                return Self(candidate);
            }
        }
    }

    /// Sample a uniform nonzero element.
    pub fn gen_random_nonzero<R: Rng>(rng: &mut R) -> Self {
        loop {
            let candidate = Self::gen_random(rng);
            if !candidate.is_zero() {
                return candidate;
            }
        }
    }

    /// Encode as 16 big-endian bytes.
    pub fn encode(&self) -> EncodedModularNumber {
        EncodedModularNumber(self.0.to_be_bytes())
    }

    /// Decode from the 16 byte big-endian wire form.
    pub fn try_decode(encoded: &EncodedModularNumber) -> Result<Self, DecodeError> {
        let value = u128::from_be_bytes(encoded.0);
        if value >= MODULO {
            return Err(DecodeError::ValueTooLarge);
        }
        Ok(Self(value))
    }
}

fn reduce_once(value: u128) -> u128 {
    if value >= MODULO { value - MODULO } else { value }
}

impl Add for ModularNumber {
    type Output = ModularNumber;

    fn add(self, rhs: ModularNumber) -> ModularNumber {
        // Both operands are canonical so the sum fits in the carrier type.
        ModularNumber(reduce_once(self.0 + rhs.0))
    }
}

impl Add<&ModularNumber> for ModularNumber {
    type Output = ModularNumber;

    fn add(self, rhs: &ModularNumber) -> ModularNumber {
        self + *rhs
    }
}

impl Sub for ModularNumber {
    type Output = ModularNumber;

    fn sub(self, rhs: ModularNumber) -> ModularNumber {
        ModularNumber(reduce_once(self.0 + (MODULO - rhs.0)))
    }
}

impl Sub<&ModularNumber> for ModularNumber {
    type Output = ModularNumber;

    fn sub(self, rhs: &ModularNumber) -> ModularNumber {
        self - *rhs
    }
}

impl Mul for ModularNumber {
    type Output = ModularNumber;

    fn mul(self, rhs: ModularNumber) -> ModularNumber {
        let (lo, hi) = U128::from(self.0).mul_wide(&U128::from(rhs.0));
        let lo = u128::from_be_bytes(lo.to_be_bytes());
        let hi = u128::from_be_bytes(hi.to_be_bytes());
        // hi·2^128 + lo ≡ 2·hi + lo, and hi < 2^126 so the shift is safe.
        let folded = (lo & MODULO) + (lo >> 127) + (hi << 1);
        let folded = (folded & MODULO) + (folded >> 127);
        ModularNumber(reduce_once(folded))
    }
}

impl Mul<&ModularNumber> for ModularNumber {
    type Output = ModularNumber;

    fn mul(self, rhs: &ModularNumber) -> ModularNumber {
        self * *rhs
    }
}

impl Neg for ModularNumber {
    type Output = ModularNumber;

    fn neg(self) -> ModularNumber {
        ModularNumber::ZERO - self
    }
}

impl fmt::Debug for ModularNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModularNumber({})", self.0)
    }
}

impl fmt::Display for ModularNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The 16 byte big-endian wire form of a field element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedModularNumber([u8; 16]);

impl EncodedModularNumber {
    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<ModularNumber> for EncodedModularNumber {
    fn from(value: ModularNumber) -> Self {
        value.encode()
    }
}

#[allow(clippy::arithmetic_side_effects)]
#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use rstest::rstest;

    #[test]
    fn addition_wraps() {
        let max = ModularNumber::new(MODULO - 1);
        assert_eq!(max + ModularNumber::ONE, ModularNumber::ZERO);
        assert_eq!(max + ModularNumber::from_u32(3), ModularNumber::from_u32(2));
    }

    #[test]
    fn subtraction_wraps() {
        let result = ModularNumber::ZERO - ModularNumber::ONE;
        assert_eq!(result, ModularNumber::new(MODULO - 1));
        assert_eq!(result + ModularNumber::ONE, ModularNumber::ZERO);
    }

    #[test]
    fn multiplication_reduces() {
        let max = ModularNumber::new(MODULO - 1);
        // (p - 1)^2 = p^2 - 2p + 1 ≡ 1.
        assert_eq!(max * max, ModularNumber::ONE);

        let a = ModularNumber::new(1 << 126);
        // 2^126 · 2 = 2^127 ≡ 1.
        assert_eq!(a * ModularNumber::from_u32(2), ModularNumber::ONE);
    }

    #[test]
    fn small_products() {
        let a = ModularNumber::from_u64(1_000_000_007);
        let b = ModularNumber::from_u64(998_244_353);
        assert_eq!((a * b).into_value(), 1_000_000_007u128 * 998_244_353u128);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(1234567890123456789)]
    fn inverse_round_trip(#[case] value: u64) {
        let element = ModularNumber::from_u64(value);
        let inverse = element.inv().unwrap();
        assert_eq!(element * inverse, ModularNumber::ONE);
    }

    #[test]
    fn inverse_of_zero_fails() {
        assert_eq!(ModularNumber::ZERO.inv(), Err(DivByZero));
    }

    #[test]
    fn pow_matches_repeated_multiplication() {
        let base = ModularNumber::from_u32(3);
        let mut expected = ModularNumber::ONE;
        for _ in 0..17 {
            expected = expected * base;
        }
        assert_eq!(base.pow(17), expected);
    }

    #[test]
    fn encode_round_trip() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..10 {
            let element = ModularNumber::gen_random(&mut rng);
            let decoded = ModularNumber::try_decode(&element.encode()).unwrap();
            assert_eq!(decoded, element);
        }
    }

    #[test]
    fn decode_rejects_non_canonical() {
        let encoded = EncodedModularNumber(u128::MAX.to_be_bytes());
        assert_eq!(ModularNumber::try_decode(&encoded), Err(DecodeError::ValueTooLarge));
    }

    #[test]
    fn nonzero_sampling_never_yields_zero() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        for _ in 0..64 {
            assert!(!ModularNumber::gen_random_nonzero(&mut rng).is_zero());
        }
    }

    #[test]
    fn seeded_sampling_is_deterministic() {
        let mut a = ChaCha20Rng::seed_from_u64(42);
        let mut b = ChaCha20Rng::seed_from_u64(42);
        assert_eq!(ModularNumber::gen_random(&mut a), ModularNumber::gen_random(&mut b));
    }
}
