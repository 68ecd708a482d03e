//! The state half of the state machine contract.

use crate::errors::{InvalidStateError, StateMachineError};
use serde::{de::DeserializeOwned, Serialize};

/// A protocol instance's state.
///
/// Implementations define the message types the instance consumes and
/// produces, how a message mutates the state, and when the accumulated state
/// is complete enough to transition. States are taken by value on every
/// handled message so a transition can move its contents forward.
pub trait StateMachineState
where
    Self: Sized,
{
    /// The type used to address recipients of output messages.
    type RecipientId;

    /// The input message this state machine consumes.
    type InputMessage: Serialize + DeserializeOwned + Clone + Send;

    /// The output message this state machine emits towards other parties.
    type OutputMessage: Serialize + DeserializeOwned + Clone + Send;

    /// The final result produced on completion.
    type FinalResult: Send;

    /// Whether the current state has gathered everything it needs.
    fn is_completed(&self) -> bool;

    /// Advance out of a completed state.
    fn try_next(self) -> StateMachineStateResult<Self>;

    /// Handle one input message.
    fn handle_message(self, message: Self::InputMessage) -> StateMachineStateResult<Self>;
}

/// What handling a message produced.
pub enum StateMachineStateOutput<S: StateMachineState> {
    /// The state absorbed the message without emitting anything.
    Empty(S),

    /// The state emitted messages for other parties.
    Messages(S, Vec<StateMachineMessage<S>>),

    /// The state machine finished; the state itself was consumed.
    Final(S::FinalResult),
}

impl<S: StateMachineState> StateMachineStateOutput<S> {
    /// Consume this output keeping only the final result.
    pub fn into_final(self) -> Result<S::FinalResult, InvalidStateError> {
        match self {
            Self::Final(output) => Ok(output),
            Self::Empty(_) | Self::Messages(..) => Err(InvalidStateError),
        }
    }
}

impl<S: StateMachineState> From<S> for StateMachineStateOutput<S> {
    fn from(state: S) -> Self {
        Self::Empty(state)
    }
}

/// The result alias every `handle_message` returns.
pub type StateMachineStateResult<S> = Result<StateMachineStateOutput<S>, StateMachineError>;

/// A recipient for an output message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Recipient<T> {
    /// A single recipient.
    Single(T),

    /// Multiple recipients.
    Multiple(Vec<T>),
}

/// An output message addressed to one or more recipients.
#[derive(Clone, Debug)]
pub struct RecipientMessage<I, O> {
    recipient: Recipient<I>,
    contents: O,
}

impl<I, O> RecipientMessage<I, O> {
    /// Constructs a new message.
    pub fn new(recipient: Recipient<I>, contents: O) -> Self {
        Self { recipient, contents }
    }

    /// The recipient of this message.
    pub fn recipient(&self) -> &Recipient<I> {
        &self.recipient
    }

    /// The contents of this message.
    pub fn contents(&self) -> &O {
        &self.contents
    }

    /// Consumes this message into its recipient and contents.
    pub fn into_parts(self) -> (Recipient<I>, O) {
        (self.recipient, self.contents)
    }
}

/// An alias deriving the message type from a state.
#[allow(type_alias_bounds)]
pub type StateMachineMessage<S: StateMachineState> =
    RecipientMessage<S::RecipientId, S::OutputMessage>;

/// Helper extensions over any state machine state.
pub trait StateMachineStateExt: StateMachineState {
    /// Transition if the state is completed, otherwise keep gathering.
    fn advance_if_completed(self) -> StateMachineStateResult<Self>;
}

impl<T: StateMachineState> StateMachineStateExt for T {
    fn advance_if_completed(self) -> StateMachineStateResult<Self> {
        if self.is_completed() { self.try_next() } else { Ok(StateMachineStateOutput::Empty(self)) }
    }
}
