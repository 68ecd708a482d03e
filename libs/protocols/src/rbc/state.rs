//! Reliable broadcast state machine.

use crate::{config::ProtocolConfig, envelope::Vid};
use basic_types::{PartyId, PartyJar, PartyMessage};
use serde::{Deserialize, Serialize};
use state_machine::{
    state::{Recipient, StateMachineMessage},
    StateMachineState, StateMachineStateExt, StateMachineStateOutput, StateMachineStateResult,
};

/// The value a broadcast instance disseminates: a proposal, possibly empty.
pub type RbcValue = Option<Vid>;

/// The broadcast state definitions.
pub mod states {
    use super::RbcValue;
    use crate::config::ProtocolConfig;
    use basic_types::{PartyId, PartyJar};

    /// The echo/ready exchange runs until delivery.
    pub struct Exchanging {
        /// The network parameters.
        pub config: ProtocolConfig,

        /// The designated broadcaster of this instance, fixed by creation or
        /// by the first init. Only the broadcaster sends inits under the
        /// omission model.
        pub broadcaster: Option<PartyId>,

        /// Whether we already echoed the broadcaster's init.
        pub echoed: bool,

        /// Whether we already sent our ready.
        pub readied: bool,

        /// Echoes received so far.
        pub echoes: PartyJar<RbcValue>,

        /// Readies received so far.
        pub readies: PartyJar<RbcValue>,
    }
}

/// The state machine for one reliable broadcast instance.
pub enum RbcState {
    /// Collecting inits, echoes and readies until the delivery quorum forms.
    Exchanging(states::Exchanging),
}

use RbcState::*;

impl RbcState {
    /// Constructs a passive instance, used by every party except the sender.
    pub fn new(config: ProtocolConfig, broadcaster: Option<PartyId>) -> Self {
        Exchanging(states::Exchanging {
            config,
            broadcaster,
            echoed: false,
            readied: false,
            echoes: PartyJar::new(),
            readies: PartyJar::new(),
        })
    }

    /// Constructs the sender's instance, producing the init broadcast.
    pub fn new_as_sender(
        config: ProtocolConfig,
        broadcaster: PartyId,
        value: RbcValue,
    ) -> (Self, Vec<StateMachineMessage<Self>>) {
        let message = Self::broadcast(&config, RbcMessage::Init(value));
        (Self::new(config, Some(broadcaster)), vec![message])
    }

    fn broadcast(config: &ProtocolConfig, message: RbcMessage) -> StateMachineMessage<Self> {
        StateMachineMessage::<Self>::new(Recipient::Multiple(config.parties().to_vec()), message)
    }

    fn handle_message(
        self,
        message: PartyMessage<RbcMessage>,
    ) -> StateMachineStateResult<Self> {
        let (sender, message) = message.into_parts();
        let Exchanging(mut state) = self;
        let mut messages = Vec::new();
        match message {
            RbcMessage::Init(value) => {
                // Only the designated broadcaster's first init counts.
                if state.broadcaster.map_or(true, |broadcaster| broadcaster == sender)
                    && !state.echoed
                {
                    state.broadcaster = Some(sender);
                    state.echoed = true;
                    messages.push(Self::broadcast(&state.config, RbcMessage::Echo(value)));
                }
            }
            RbcMessage::Echo(value) => {
                // Duplicates are idempotent re-deliveries.
                let _ = state.echoes.add_element(sender, value);
                if !state.readied && state.echoes.matching_count(&value) >= state.config.quorum() {
                    state.readied = true;
                    messages.push(Self::broadcast(&state.config, RbcMessage::Ready(value)));
                }
            }
            RbcMessage::Ready(value) => {
                let _ = state.readies.add_element(sender, value);
                if !state.readied
                    && state.readies.matching_count(&value) >= state.config.amplify()
                {
                    state.readied = true;
                    messages.push(Self::broadcast(&state.config, RbcMessage::Ready(value)));
                }
            }
        }
        // Emitting and delivering in one step would drop the emission, and a
        // dropped ready can starve another party's quorum. Our own broadcast
        // loops back through the transport, so delivery is re-checked then.
        if messages.is_empty() {
            Exchanging(state).advance_if_completed()
        } else {
            Ok(StateMachineStateOutput::Messages(Exchanging(state), messages))
        }
    }

    fn delivery_quorum(state: &states::Exchanging) -> Option<RbcValue> {
        state
            .readies
            .elements()
            .map(|(_, value)| *value)
            .find(|value| state.readies.matching_count(value) >= state.config.quorum())
    }
}

impl StateMachineState for RbcState {
    type RecipientId = PartyId;
    type InputMessage = PartyMessage<RbcMessage>;
    type OutputMessage = RbcMessage;
    type FinalResult = RbcValue;

    fn is_completed(&self) -> bool {
        let Exchanging(state) = self;
        Self::delivery_quorum(state).is_some()
    }

    fn try_next(self) -> StateMachineStateResult<Self> {
        let Exchanging(state) = self;
        match Self::delivery_quorum(&state) {
            Some(value) => Ok(StateMachineStateOutput::Final(value)),
            None => Ok(StateMachineStateOutput::Empty(Exchanging(state))),
        }
    }

    fn handle_message(self, message: Self::InputMessage) -> StateMachineStateResult<Self> {
        self.handle_message(message)
    }
}

/// A message for one reliable broadcast instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RbcMessage {
    /// The broadcaster's value.
    Init(RbcValue),

    /// Echo of the value.
    Echo(RbcValue),

    /// Ready vouching for the value.
    Ready(RbcValue),
}
