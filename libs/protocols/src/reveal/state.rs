//! Open/reveal state machine.

use crate::config::ProtocolConfig;
use anyhow::{anyhow, Context};
use basic_types::{PartyId, PartyJar, PartyMessage};
use math_lib::modular::{EncodedModularNumber, ModularNumber};
use serde::{Deserialize, Serialize};
use shamir_sharing::ShamirSecretSharer;
use state_machine::{
    state::{Recipient, StateMachineMessage},
    StateMachineState, StateMachineStateExt, StateMachineStateOutput, StateMachineStateResult,
};
use std::sync::Arc;

/// Who learns the opened value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevealMode {
    /// Every party broadcasts its share and reconstructs.
    Public,

    /// Every party sends its share privately to the target, which is the
    /// only party that reconstructs.
    ToParty(PartyId),
}

/// The reveal state definitions.
pub mod states {
    use crate::config::ProtocolConfig;
    use basic_types::PartyJar;
    use math_lib::modular::ModularNumber;
    use shamir_sharing::ShamirSecretSharer;
    use std::sync::Arc;

    /// Shares are being collected.
    pub struct WaitingShares {
        /// The network parameters.
        pub config: ProtocolConfig,

        /// The secret sharer used for reconstruction.
        pub secret_sharer: Arc<ShamirSecretSharer>,

        /// Whether this instance reconstructs at all. Share senders in a
        /// to-party open never do.
        pub expects_result: bool,

        /// Whether our own share was provided already.
        pub input_sent: bool,

        /// The shares received so far.
        pub shares: PartyJar<ModularNumber>,
    }
}

/// The state machine for one open session.
pub enum RevealState {
    /// Collecting shares until the reconstruction threshold.
    WaitingShares(states::WaitingShares),
}

use RevealState::*;

impl RevealState {
    /// Constructs an instance that has not contributed its own share yet.
    ///
    /// This is the shape lazily created for whichever share arrives first;
    /// instances created this way always reconstruct.
    pub fn new(config: ProtocolConfig, secret_sharer: Arc<ShamirSecretSharer>) -> Self {
        WaitingShares(states::WaitingShares {
            config,
            secret_sharer,
            expects_result: true,
            input_sent: false,
            shares: PartyJar::new(),
        })
    }

    fn handle_message(self, message: PartyMessage<RevealMessage>) -> StateMachineStateResult<Self> {
        let (sender, message) = message.into_parts();
        let WaitingShares(mut state) = self;
        let mut messages = Vec::new();
        match message {
            RevealMessage::Input { mode, share } => {
                let share = ModularNumber::try_decode(&share).context("share decoding")?;
                if !state.input_sent {
                    state.input_sent = true;
                    Self::apply_input(&mut state, mode, share, &mut messages);
                }
            }
            RevealMessage::Share(share) => {
                let share = ModularNumber::try_decode(&share).context("share decoding")?;
                let _ = state.shares.add_element(sender, share);
            }
        }
        if messages.is_empty() {
            WaitingShares(state).advance_if_completed()
        } else {
            Ok(StateMachineStateOutput::Messages(WaitingShares(state), messages))
        }
    }

    fn apply_input(
        state: &mut states::WaitingShares,
        mode: RevealMode,
        share: ModularNumber,
        messages: &mut Vec<StateMachineMessage<Self>>,
    ) {
        let local = state.secret_sharer.local_party_id();
        match mode {
            RevealMode::Public => {
                messages.push(StateMachineMessage::<Self>::new(
                    Recipient::Multiple(state.config.parties().to_vec()),
                    RevealOutputMessage::Open(share.encode()),
                ));
            }
            RevealMode::ToParty(target) if target == local => {
                // Our own contribution never crosses the network.
                let _ = state.shares.add_element(local, share);
            }
            RevealMode::ToParty(target) => {
                state.expects_result = false;
                messages.push(StateMachineMessage::<Self>::new(
                    Recipient::Single(target),
                    RevealOutputMessage::Mask(share.encode()),
                ));
            }
        }
    }
}

impl StateMachineState for RevealState {
    type RecipientId = PartyId;
    type InputMessage = PartyMessage<RevealMessage>;
    type OutputMessage = RevealOutputMessage;
    type FinalResult = ModularNumber;

    fn is_completed(&self) -> bool {
        let WaitingShares(state) = self;
        state.expects_result
            && state.shares.stored_party_count() >= state.secret_sharer.recovery_threshold()
    }

    fn try_next(self) -> StateMachineStateResult<Self> {
        let WaitingShares(state) = self;
        if !state.expects_result
            || state.shares.stored_party_count() < state.secret_sharer.recovery_threshold()
        {
            return Ok(StateMachineStateOutput::Empty(WaitingShares(state)));
        }
        let shares: Vec<_> =
            state.shares.elements().map(|(party, share)| (*party, *share)).collect();
        let value = state
            .secret_sharer
            .recover(shares)
            .map_err(|e| anyhow!("failed to reconstruct opened value: {e}"))?;
        Ok(StateMachineStateOutput::Final(value))
    }

    fn handle_message(self, message: Self::InputMessage) -> StateMachineStateResult<Self> {
        self.handle_message(message)
    }
}

/// A message for one open session.
///
/// `Input` never crosses the network; the dispatcher injects it when the
/// enclosing protocol provides our share of the opened value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RevealMessage {
    /// Our own share and the opening mode.
    Input {
        /// Who learns the value.
        mode: RevealMode,
        /// Our share of it.
        share: EncodedModularNumber,
    },

    /// Another party's share.
    Share(EncodedModularNumber),
}

/// An output message emitted by one open session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RevealOutputMessage {
    /// A broadcast share of a publicly opened value.
    Open(EncodedModularNumber),

    /// A privately sent share of an owner-only value.
    Mask(EncodedModularNumber),
}
