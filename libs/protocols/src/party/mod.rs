//! The party: one event-driven state machine hosting every protocol
//! instance.
//!
//! A party consumes one envelope at a time, routes it to the instance its
//! session id names, then advances its drivers (common-set instances,
//! multiplication gates, the auction orchestrator) to a fixpoint and hands
//! the queued outbound envelopes back to the transport. No party ever holds
//! a reference to another party's state.

pub mod store;

use crate::{
    acs::Acs,
    auction::AuctionDriver,
    config::ProtocolConfig,
    envelope::Envelope,
    mul::Mul,
    preprocessing::RandomBitBank,
    session::SessionId,
};
use anyhow::{anyhow, Context};
use basic_types::PartyId;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::{ShamirError, ShamirSecretSharer};
use std::{collections::BTreeMap, sync::Arc};
use store::{OutboundMessage, SessionStore};
use tracing::{debug, trace};

/// One protocol party.
pub struct Party {
    store: SessionStore,
    acs: BTreeMap<SessionId, Acs>,
    muls: BTreeMap<SessionId, Mul>,
    auction: AuctionDriver,
}

impl Party {
    /// Constructs a party with its private bid and pre-dealt bit shares.
    pub fn new(
        config: ProtocolConfig,
        local_id: PartyId,
        bid: u64,
        bank: RandomBitBank,
        rng: ChaCha20Rng,
    ) -> Result<Self, ShamirError> {
        let secret_sharer = Arc::new(ShamirSecretSharer::new(
            local_id,
            config.fault_threshold(),
            config.parties().to_vec(),
        )?);
        let store = SessionStore::new(config.clone(), local_id, secret_sharer, rng);
        let auction = AuctionDriver::new(config, bid, bank);
        Ok(Self { store, acs: BTreeMap::new(), muls: BTreeMap::new(), auction })
    }

    /// Our party id.
    pub fn local_id(&self) -> PartyId {
        self.store.local_id()
    }

    /// Kicks off the run: deals our bid and drains the initial messages.
    pub fn bootstrap(&mut self) -> anyhow::Result<Vec<OutboundMessage>> {
        debug!(party = %self.local_id(), "bootstrapping");
        self.advance()?;
        Ok(self.store.drain_outbox())
    }

    /// Handles one delivered envelope and returns everything we send in
    /// response.
    pub fn handle_envelope(&mut self, envelope: Envelope) -> anyhow::Result<Vec<OutboundMessage>> {
        self.store.handle_envelope(envelope).context("dispatching envelope")?;
        self.advance()?;
        Ok(self.store.drain_outbox())
    }

    /// Our final output, once the auction completed locally.
    pub fn output(&self) -> Option<u128> {
        self.auction.result().map(|value| value.into_value())
    }

    /// The agreed active bidder set, once decided.
    pub fn active_set(&self) -> Option<&[PartyId]> {
        self.auction.active_set()
    }

    /// How many multiplication gates this party has run.
    pub fn multiplication_count(&self) -> usize {
        self.muls.len()
    }

    /// Advances every driver until nothing changes.
    ///
    /// Drivers are pull-based and idempotent; the store's version counter
    /// records instance results, queued messages and driver transitions, so
    /// a stable version means a true fixpoint.
    fn advance(&mut self) -> anyhow::Result<()> {
        let start = self.store.version();
        let mut rounds = 0u32;
        loop {
            let before = self.store.version();
            let Self { store, acs, muls, auction } = self;
            auction.advance(store, acs, muls)?;
            for driver in acs.values_mut() {
                driver.advance(store).context("advancing common set")?;
            }
            for gate in muls.values_mut() {
                let driver = acs
                    .get_mut(&gate.acs_session())
                    .ok_or_else(|| anyhow!("multiplication without its common set"))?;
                gate.advance(store, driver)?;
            }
            rounds += 1;
            if self.store.version() == before {
                if self.store.version() != start {
                    trace!(party = %self.store.local_id(), rounds, "drivers reached fixpoint");
                }
                return Ok(());
            }
        }
    }
}
