//! Complete secret sharing state machine.

use crate::{config::ProtocolConfig, envelope::Vid};
use anyhow::{anyhow, Context};
use basic_types::{PartyId, PartyJar, PartyMessage};
use math_lib::{
    modular::{EncodedModularNumber, ModularNumber},
    polynomial::Polynomial,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use shamir_sharing::{PolyDegree, ShamirSecretSharer};
use sha2::{Digest, Sha256};
use state_machine::{
    errors::StateMachineError,
    state::{Recipient, StateMachineMessage},
    StateMachineState, StateMachineStateExt, StateMachineStateOutput, StateMachineStateResult,
};
use std::sync::Arc;

/// The sharing state definitions.
pub mod states {
    use crate::{config::ProtocolConfig, envelope::Vid};
    use basic_types::{PartyId, PartyJar};
    use math_lib::{modular::ModularNumber, polynomial::Polynomial};
    use shamir_sharing::ShamirSecretSharer;
    use std::sync::Arc;

    /// The echo/ready exchange runs until finalization.
    pub struct Exchanging {
        /// The network parameters.
        pub config: ProtocolConfig,

        /// The secret sharer used for consistency checks and derivation.
        pub secret_sharer: Arc<ShamirSecretSharer>,

        /// The dealer of this session, fixed by creation or the first direct
        /// share. Lazily created instances learn it late; only the dealer
        /// ever sends shares under the omission model.
        pub dealer: Option<PartyId>,

        /// The share the dealer sent us directly, if it arrived.
        pub direct_share: Option<ModularNumber>,

        /// Whether we already echoed our share.
        pub echoed: bool,

        /// Whether we already sent a ready.
        pub readied: bool,

        /// Echoed share points received so far.
        pub echoes: PartyJar<ModularNumber>,

        /// Readies received so far.
        pub readies: PartyJar<Vid>,

        /// The polynomial pinned by a consistent echo quorum, with its vid.
        pub candidate: Option<(Vid, Polynomial)>,
    }
}

/// What a finalized sharing session yields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CssOutput {
    /// The binding value id of the finalized polynomial.
    pub vid: Vid,

    /// Our own share of the secret.
    pub share: ModularNumber,
}

/// Inconsistent sharing evidence was observed.
///
/// Unreachable while the dealer only ever omits messages; surfacing it kills
/// the party, which is the intended handling for fault-model violations.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("inconsistent secret sharing evidence")]
pub struct InvalidShare;

/// The state machine for one sharing session.
pub enum CssState {
    /// Collecting the dealer's share, echoes and readies.
    Exchanging(states::Exchanging),
}

use CssState::*;

impl CssState {
    /// Constructs a passive instance for a session dealt by someone else.
    pub fn new(
        config: ProtocolConfig,
        secret_sharer: Arc<ShamirSecretSharer>,
        dealer: Option<PartyId>,
    ) -> Self {
        Exchanging(states::Exchanging {
            config,
            secret_sharer,
            dealer,
            direct_share: None,
            echoed: false,
            readied: false,
            echoes: PartyJar::new(),
            readies: PartyJar::new(),
            candidate: None,
        })
    }

    /// Constructs the dealer's instance, producing one private share message
    /// per party.
    pub fn new_as_dealer<R: Rng>(
        config: ProtocolConfig,
        secret_sharer: Arc<ShamirSecretSharer>,
        secret: &ModularNumber,
        rng: &mut R,
    ) -> (Self, Vec<StateMachineMessage<Self>>) {
        let dealer = secret_sharer.local_party_id();
        let shares = secret_sharer.generate_shares(secret, PolyDegree::T, rng);
        let mut messages = Vec::new();
        for party in config.parties() {
            if let Some(share) = shares.get(party) {
                messages.push(StateMachineMessage::<Self>::new(
                    Recipient::Single(*party),
                    CssMessage::Share(share.encode()),
                ));
            }
        }
        (Self::new(config, secret_sharer, Some(dealer)), messages)
    }

    fn handle_message(self, message: PartyMessage<CssMessage>) -> StateMachineStateResult<Self> {
        let (sender, message) = message.into_parts();
        let Exchanging(mut state) = self;
        let mut messages = Vec::new();
        match message {
            CssMessage::Share(share) => {
                let share = ModularNumber::try_decode(&share).context("share decoding")?;
                if state.dealer.map_or(true, |dealer| dealer == sender)
                    && state.direct_share.is_none()
                {
                    state.dealer = Some(sender);
                    state.direct_share = Some(share);
                    if !state.echoed {
                        state.echoed = true;
                        messages.push(StateMachineMessage::<Self>::new(
                            Recipient::Multiple(state.config.parties().to_vec()),
                            CssMessage::Echo(share.encode()),
                        ));
                    }
                }
            }
            CssMessage::Echo(value) => {
                let value = ModularNumber::try_decode(&value).context("echo decoding")?;
                let newly_added = state.echoes.add_element(sender, value).is_ok();
                if newly_added {
                    if let Some((_, polynomial)) = &state.candidate {
                        Self::check_point(&state, polynomial, sender, value)?;
                    } else if state.echoes.stored_party_count() >= state.config.quorum() {
                        let (vid, polynomial) = Self::pin_candidate(&state)?;
                        state.candidate = Some((vid, polynomial));
                        if !state.readied {
                            state.readied = true;
                            messages.push(StateMachineMessage::<Self>::new(
                                Recipient::Multiple(state.config.parties().to_vec()),
                                CssMessage::Ready(vid),
                            ));
                        }
                    }
                }
            }
            CssMessage::Ready(vid) => {
                let _ = state.readies.add_element(sender, vid);
            }
        }
        if messages.is_empty() {
            Exchanging(state).advance_if_completed()
        } else {
            Ok(StateMachineStateOutput::Messages(Exchanging(state), messages))
        }
    }

    /// Interpolates the defining polynomial from the first `f + 1` echo
    /// points and checks every other echo against it.
    fn pin_candidate(
        state: &states::Exchanging,
    ) -> Result<(Vid, Polynomial), StateMachineError> {
        let defining: Vec<_> = state
            .echoes
            .elements()
            .take(state.config.amplify())
            .map(|(party, value)| (*party, *value))
            .collect();
        let polynomial = state
            .secret_sharer
            .recover_polynomial(defining)
            .map_err(|e| anyhow!("pinning echo evidence: {e}"))?;
        for (party, value) in state.echoes.elements().skip(state.config.amplify()) {
            Self::check_point(state, &polynomial, *party, *value)?;
        }
        let vid = Self::binding_vid(state, &polynomial);
        Ok((vid, polynomial))
    }

    fn check_point(
        state: &states::Exchanging,
        polynomial: &Polynomial,
        party: PartyId,
        value: ModularNumber,
    ) -> Result<(), StateMachineError> {
        if polynomial.eval(&state.secret_sharer.abscissa(party)) != value {
            return Err(anyhow::Error::new(InvalidShare).into());
        }
        Ok(())
    }

    /// The digest of the polynomial's canonical evaluation points.
    ///
    /// Hashing the evaluations at every party index, in index order, makes
    /// the vid independent of which echo subset pinned the polynomial.
    fn binding_vid(state: &states::Exchanging, polynomial: &Polynomial) -> Vid {
        let mut hasher = Sha256::new();
        for party in state.config.parties() {
            let x = state.secret_sharer.abscissa(*party);
            hasher.update(x.encode().as_bytes());
            hasher.update(polynomial.eval(&x).encode().as_bytes());
        }
        Vid::new(hasher.finalize().into())
    }

    fn ready_quorum(state: &states::Exchanging) -> Option<Vid> {
        state
            .readies
            .elements()
            .map(|(_, vid)| *vid)
            .find(|vid| state.readies.matching_count(vid) >= state.config.quorum())
    }

    fn share_derivable(state: &states::Exchanging) -> bool {
        state.direct_share.is_some()
            || state.candidate.is_some()
            || state.echoes.stored_party_count() >= state.config.amplify()
    }
}

impl StateMachineState for CssState {
    type RecipientId = PartyId;
    type InputMessage = PartyMessage<CssMessage>;
    type OutputMessage = CssMessage;
    type FinalResult = CssOutput;

    fn is_completed(&self) -> bool {
        let Exchanging(state) = self;
        Self::ready_quorum(state).is_some() && Self::share_derivable(state)
    }

    fn try_next(self) -> StateMachineStateResult<Self> {
        let Exchanging(state) = self;
        let Some(vid) = Self::ready_quorum(&state) else {
            return Ok(StateMachineStateOutput::Empty(Exchanging(state)));
        };
        // Prefer the pinned polynomial; fall back to the direct share, then
        // to deriving one from f + 1 echo points (dealer omitted us).
        let (candidate_vid, share) = match &state.candidate {
            Some((candidate_vid, polynomial)) => {
                let own = polynomial.eval(&state.secret_sharer.abscissa(state.secret_sharer.local_party_id()));
                (Some(*candidate_vid), Some(own))
            }
            None => (None, state.direct_share),
        };
        let share = match share {
            Some(share) => share,
            None => {
                if state.echoes.stored_party_count() < state.config.amplify() {
                    return Ok(StateMachineStateOutput::Empty(Exchanging(state)));
                }
                let (derived_vid, polynomial) = Self::pin_candidate(&state)?;
                if derived_vid != vid {
                    return Err(anyhow::Error::new(InvalidShare).into());
                }
                polynomial.eval(&state.secret_sharer.abscissa(state.secret_sharer.local_party_id()))
            }
        };
        if let Some(candidate_vid) = candidate_vid {
            if candidate_vid != vid {
                return Err(anyhow::Error::new(InvalidShare).into());
            }
        }
        Ok(StateMachineStateOutput::Final(CssOutput { vid, share }))
    }

    fn handle_message(self, message: Self::InputMessage) -> StateMachineStateResult<Self> {
        self.handle_message(message)
    }
}

/// A message for one sharing session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CssMessage {
    /// The dealer's direct share for the receiving party.
    Share(EncodedModularNumber),

    /// A party's broadcast echo of its own share point.
    Echo(EncodedModularNumber),

    /// A party vouches for the vid after checking an echo quorum.
    Ready(Vid),
}
