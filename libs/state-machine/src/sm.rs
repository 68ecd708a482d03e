//! State machine ownership wrapper.

use crate::{
    errors::{InvalidStateError, StateMachineError, StateUnavailableError},
    state::{RecipientMessage, StateMachineState, StateMachineStateOutput},
};

enum StateMachineInner<S> {
    Taken,
    State(S),
    Finalized,
}

impl<S> StateMachineInner<S> {
    fn state_mut(&mut self) -> Result<&mut S, StateUnavailableError> {
        if let Self::State(state) = self { Ok(state) } else { Err(self.as_error()) }
    }

    fn take_state(&mut self) -> Result<S, StateUnavailableError> {
        let state = std::mem::replace(self, StateMachineInner::Taken);
        if let Self::State(state) = state { Ok(state) } else { Err(state.as_error()) }
    }

    fn as_error(&self) -> StateUnavailableError {
        let detail = match self {
            Self::Taken => "state is taken",
            Self::Finalized => "state machine reached terminal state",
            Self::State(_) => "internal error",
        };
        StateUnavailableError(detail)
    }
}

/// Owns a [`StateMachineState`] and drives it message by message.
pub struct StateMachine<S: StateMachineState> {
    inner: StateMachineInner<S>,
}

impl<S: StateMachineState> StateMachine<S> {
    /// Creates a new state machine.
    pub fn new(initial_state: S) -> Self {
        StateMachine { inner: StateMachineInner::State(initial_state) }
    }

    /// A mutable reference to the current state, if it is still live.
    pub fn state_mut(&mut self) -> Result<&mut S, StateUnavailableError> {
        self.inner.state_mut()
    }

    /// Whether the state machine produced its final result.
    pub fn is_finished(&self) -> bool {
        matches!(&self.inner, StateMachineInner::Finalized)
    }

    /// Feed one message to the underlying state.
    ///
    /// Returns an error when called after the final result was produced;
    /// dispatchers are expected to drop late messages instead.
    pub fn handle_message(
        &mut self,
        message: S::InputMessage,
    ) -> Result<HandleOutput<S>, StateMachineError> {
        let state = self.inner.take_state()?;
        let output = state.handle_message(message)?;
        Ok(self.apply_state_output(output))
    }

    fn apply_state_output(&mut self, output: StateMachineStateOutput<S>) -> HandleOutput<S> {
        match output {
            StateMachineStateOutput::Empty(state) => {
                self.inner = StateMachineInner::State(state);
                StateMachineOutput::Empty
            }
            StateMachineStateOutput::Messages(state, messages) => {
                self.inner = StateMachineInner::State(state);
                StateMachineOutput::Messages(messages)
            }
            StateMachineStateOutput::Final(output) => {
                self.inner = StateMachineInner::Finalized;
                StateMachineOutput::Final(output)
            }
        }
    }
}

/// The wrapper-level output of handling a message.
#[derive(Debug)]
pub enum StateMachineOutput<R, O, F> {
    /// Messages to forward to other parties.
    Messages(Vec<RecipientMessage<R, O>>),

    /// The final output of the state machine.
    Final(F),

    /// Nothing to do.
    Empty,
}

impl<R, O, F> StateMachineOutput<R, O, F> {
    /// Convert into a final output, error otherwise.
    pub fn into_final(self) -> Result<F, InvalidStateError> {
        match self {
            Self::Final(output) => Ok(output),
            _ => Err(InvalidStateError),
        }
    }

    /// Convert into output messages, error otherwise.
    pub fn into_messages(self) -> Result<Vec<RecipientMessage<R, O>>, InvalidStateError> {
        match self {
            Self::Messages(messages) => Ok(messages),
            _ => Err(InvalidStateError),
        }
    }
}

/// An alias for `StateMachineOutput` based on a state type.
#[allow(type_alias_bounds)]
pub type HandleOutput<S: StateMachineState> =
    StateMachineOutput<S::RecipientId, S::OutputMessage, S::FinalResult>;
