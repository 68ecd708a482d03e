//! The common-set driver.

use crate::{config::ProtocolConfig, envelope::Vid, party::store::SessionStore, session::SessionId};
use basic_types::PartyId;
use state_machine::errors::StateMachineError;
use std::collections::BTreeSet;

/// One agreement-on-common-set instance.
///
/// A passive driver in the dispatcher's pull model: [`Acs::advance`] reads
/// broadcast deliveries and agreement decisions from the store and feeds
/// agreement inputs until the set is fixed. All sub-protocol sessions are
/// derived from this instance's session id.
pub struct Acs {
    session: SessionId,
    config: ProtocolConfig,
    proposed: bool,
    fed_one: BTreeSet<PartyId>,
    fed_zero: bool,
    output: Option<Vec<PartyId>>,
}

impl Acs {
    /// Constructs the driver for one session.
    pub fn new(session: SessionId, config: ProtocolConfig) -> Self {
        Self { session, config, proposed: false, fed_one: BTreeSet::new(), fed_zero: false, output: None }
    }

    /// The broadcast session of one dealer's proposal.
    pub fn rbc_session(&self, dealer: PartyId) -> SessionId {
        self.session.child(format!("rbc-{}", dealer.index()))
    }

    /// The agreement session deciding one dealer's inclusion.
    pub fn ba_session(&self, dealer: PartyId) -> SessionId {
        self.session.child(format!("ba-{}", dealer.index()))
    }

    /// The agreed set, once every agreement has decided.
    pub fn output(&self) -> Option<&[PartyId]> {
        self.output.as_deref()
    }

    /// Reliably broadcasts our own proposal, once.
    pub fn propose(&mut self, value: Vid, store: &mut SessionStore) {
        if self.proposed {
            return;
        }
        self.proposed = true;
        store.start_rbc_sender(self.rbc_session(store.local_id()), Some(value));
        store.bump();
    }

    /// Feeds agreement inputs and extracts the output as evidence allows.
    pub fn advance(&mut self, store: &mut SessionStore) -> Result<(), StateMachineError> {
        if self.output.is_some() {
            return Ok(());
        }
        let parties: Vec<PartyId> = self.config.parties().to_vec();

        // A delivered, non-empty proposal makes us vouch for its dealer.
        for dealer in &parties {
            if self.fed_one.contains(dealer) {
                continue;
            }
            if let Some(Some(_)) = store.rbc_result(&self.rbc_session(*dealer)) {
                self.fed_one.insert(*dealer);
                store.ba_input(self.ba_session(*dealer), true)?;
                store.bump();
            }
        }

        let included: Vec<PartyId> = parties
            .iter()
            .filter(|dealer| store.ba_result(&self.ba_session(**dealer)) == Some(true))
            .copied()
            .collect();

        // Only once enough dealers are in can the stragglers be voted out.
        if !self.fed_zero && included.len() >= self.config.quorum() {
            self.fed_zero = true;
            for dealer in &parties {
                let session = self.ba_session(*dealer);
                if !self.fed_one.contains(dealer) && store.ba_result(&session).is_none() {
                    store.ba_input(session, false)?;
                }
            }
            store.bump();
        }

        let all_decided =
            parties.iter().all(|dealer| store.ba_result(&self.ba_session(*dealer)).is_some());
        if all_decided && included.len() >= self.config.quorum() {
            // Deterministic truncation: smallest indices win. `included`
            // follows the party order, which is index order.
            self.output = Some(included.into_iter().take(self.config.quorum()).collect());
            store.bump();
        }
        Ok(())
    }
}
