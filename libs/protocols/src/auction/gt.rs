//! The pairwise greater-than gate.
//!
//! Computes `[a >= b]` for 5-bit bids `a`, `b`. With `k` the bid width and
//! `d = 2^k + a - b`, the comparison is bit `k` of `d`. The gate opens
//! `y = d + r` for a pre-dealt random `r` whose bits are shared, then uses
//!
//! ```text
//! d mod 2^k = (y mod 2^k) - (r mod 2^k) + 2^k * [r mod 2^k > y mod 2^k]
//! [a >= b]  = (d - d mod 2^k) / 2^k
//! ```
//!
//! where `[r mod 2^k > y mod 2^k]` compares the shared mask bits against the
//! public residue of `y` with an MSB-to-LSB prefix scan costing one
//! multiplication per bit: with public bit `y_t`, both the equality chain
//! and the strictly-greater contribution at position `t` are linear in the
//! single product `same * r_t`.

use crate::{
    acs::Acs,
    config::ProtocolConfig,
    mul::Mul,
    party::store::SessionStore,
    preprocessing::BID_BITS,
    reveal::RevealMode,
    session::SessionId,
};
use anyhow::{anyhow, Context};
use math_lib::modular::ModularNumber;
use std::collections::BTreeMap;

/// One greater-than gate: `[x_left >= x_right]`.
pub struct GtGate {
    session: SessionId,
    bits: Vec<ModularNumber>,
    d_share: ModularNumber,
    opened: bool,
    masked: Option<u64>,
    scan_bit: Option<usize>,
    same: ModularNumber,
    greater: ModularNumber,
    result: Option<ModularNumber>,
}

impl GtGate {
    /// Constructs the gate from our shares of both bids and our shares of
    /// the pair's pre-dealt mask bits.
    pub fn new(
        session: SessionId,
        left_share: ModularNumber,
        right_share: ModularNumber,
        bits: Vec<ModularNumber>,
    ) -> Self {
        let offset = ModularNumber::from_u64(1 << BID_BITS);
        Self {
            session,
            bits,
            d_share: offset + left_share - right_share,
            opened: false,
            masked: None,
            scan_bit: Some(BID_BITS - 1),
            // Shares of the public constant 1: the equality chain starts true.
            same: ModularNumber::ONE,
            greater: ModularNumber::ZERO,
            result: None,
        }
    }

    /// Our share of `[x_left >= x_right]`, once the gate completed.
    pub fn result(&self) -> Option<ModularNumber> {
        self.result
    }

    fn open_session(&self) -> SessionId {
        self.session.child("open")
    }

    fn bit_session(&self, bit: usize) -> SessionId {
        self.session.child(format!("bit-{bit}"))
    }

    /// Our share of the full mask `r`.
    fn mask_share(&self) -> ModularNumber {
        Self::weighted_sum(&self.bits)
    }

    /// Our share of `r mod 2^k`.
    fn mask_low_share(&self) -> ModularNumber {
        Self::weighted_sum(&self.bits[..BID_BITS])
    }

    fn weighted_sum(bits: &[ModularNumber]) -> ModularNumber {
        let mut sum = ModularNumber::ZERO;
        for (bit, share) in bits.iter().enumerate() {
            sum = sum + &(ModularNumber::from_u64(1 << bit) * share);
        }
        sum
    }

    /// Advances the gate as far as local evidence allows.
    pub fn advance(
        &mut self,
        store: &mut SessionStore,
        acs: &mut BTreeMap<SessionId, Acs>,
        muls: &mut BTreeMap<SessionId, Mul>,
        config: &ProtocolConfig,
    ) -> anyhow::Result<()> {
        if self.result.is_some() {
            return Ok(());
        }
        if !self.opened {
            self.opened = true;
            let masked_share = self.d_share + self.mask_share();
            store
                .reveal_input(self.open_session(), RevealMode::Public, masked_share)
                .context("opening masked difference")?;
            store.bump();
        }
        if self.masked.is_none() {
            match store.reveal_result(&self.open_session()) {
                Some(value) => {
                    let opened = u64::try_from(value.into_value())
                        .map_err(|_| anyhow!("masked open out of range"))?;
                    self.masked = Some(opened);
                    store.bump();
                }
                None => return Ok(()),
            }
        }
        let Some(y) = self.masked else {
            return Ok(());
        };

        // MSB-to-LSB scan of the shared mask bits against the public bits
        // of y. One sequential multiplication per bit.
        while let Some(bit) = self.scan_bit {
            let session = self.bit_session(bit);
            if !muls.contains_key(&session) {
                ensure_mul(muls, acs, config, session.clone(), self.same, self.bits[bit]);
                store.bump();
            }
            let Some(product) = muls.get(&session).and_then(Mul::result) else {
                return Ok(());
            };
            if (y >> bit) & 1 == 1 {
                self.same = product;
            } else {
                self.greater = self.greater + product;
                self.same = self.same - product;
            }
            self.scan_bit = if bit == 0 { None } else { Some(bit - 1) };
            store.bump();
        }

        let modulus = ModularNumber::from_u64(1 << BID_BITS);
        let y_low = ModularNumber::from_u64(y & ((1 << BID_BITS) - 1));
        let d_low = y_low - self.mask_low_share() + modulus * &self.greater;
        let inverse = modulus.inv().map_err(|e| anyhow!("bit width inverse: {e}"))?;
        self.result = Some((self.d_share - d_low) * &inverse);
        store.bump();
        Ok(())
    }
}

/// Registers a multiplication gate and its common-set instance.
pub(crate) fn ensure_mul(
    muls: &mut BTreeMap<SessionId, Mul>,
    acs: &mut BTreeMap<SessionId, Acs>,
    config: &ProtocolConfig,
    session: SessionId,
    left: ModularNumber,
    right: ModularNumber,
) {
    if muls.contains_key(&session) {
        return;
    }
    let gate = Mul::new(session.clone(), left, right);
    acs.entry(gate.acs_session()).or_insert_with(|| Acs::new(gate.acs_session(), config.clone()));
    muls.insert(session, gate);
}
