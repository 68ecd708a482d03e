//! The multiplication driver.

use crate::{
    acs::Acs,
    party::store::{SessionStore, ShareWire},
    session::SessionId,
};
use anyhow::{anyhow, Context};
use basic_types::PartyId;
use math_lib::{lagrange::Lagrange, modular::ModularNumber};

/// One multiplication gate: `[a] x [b] -> [c]`.
///
/// A passive driver advanced by the dispatcher. The local product is dealt
/// immediately; the result exists once the gate's common-set instance fixed
/// the interpolation set `T` and every selected reshare finalized locally.
pub struct Mul {
    session: SessionId,
    left: ModularNumber,
    right: ModularNumber,
    dealt: bool,
    proposed: bool,
    result: Option<ModularNumber>,
}

impl Mul {
    /// Constructs the gate from our shares of both operands.
    pub fn new(session: SessionId, left: ModularNumber, right: ModularNumber) -> Self {
        Self { session, left, right, dealt: false, proposed: false, result: None }
    }

    /// The session of this gate's common-set instance.
    pub fn acs_session(&self) -> SessionId {
        self.session.child("acs")
    }

    /// The reshare session dealt by one party.
    pub fn reshare_session(&self, dealer: PartyId) -> SessionId {
        self.session.child(format!("reshare-{}", dealer.index()))
    }

    /// Our share of the product, once the gate completed.
    pub fn result(&self) -> Option<ModularNumber> {
        self.result
    }

    /// Advances the gate as far as local evidence allows.
    pub fn advance(&mut self, store: &mut SessionStore, acs: &mut Acs) -> anyhow::Result<()> {
        if self.result.is_some() {
            return Ok(());
        }
        if !self.dealt {
            self.dealt = true;
            let product = self.left * &self.right;
            store
                .css_deal(self.reshare_session(store.local_id()), &product, ShareWire::Reshare)
                .context("dealing local product")?;
            store.bump();
        }
        if !self.proposed {
            let own = self.reshare_session(store.local_id());
            if let Some(output) = store.css_result(&own) {
                let vid = output.vid;
                self.proposed = true;
                acs.propose(vid, store);
                store.bump();
            }
        }
        let Some(selected) = acs.output().map(<[PartyId]>::to_vec) else {
            return Ok(());
        };
        let mut points = Vec::with_capacity(selected.len());
        for dealer in &selected {
            match store.css_result(&self.reshare_session(*dealer)) {
                Some(output) => points.push((*dealer, output.share)),
                // The selected reshare will finalize; completeness of the
                // sharing layer guarantees it.
                None => return Ok(()),
            }
        }
        let sharer = store.secret_sharer().clone();
        let abscissas: Vec<_> =
            selected.iter().map(|dealer| sharer.abscissa(*dealer)).collect();
        let lagrange = Lagrange::new(&abscissas).map_err(|e| anyhow!("recombination setup: {e}"))?;
        let mut share = ModularNumber::ZERO;
        for (dealer, reshare) in points {
            let coefficient = lagrange
                .coefficient(&sharer.abscissa(dealer))
                .map_err(|e| anyhow!("recombination coefficient: {e}"))?;
            share = share + &(coefficient * &reshare);
        }
        self.result = Some(share);
        store.bump();
        Ok(())
    }
}
