//! Message-driven state machines for protocol instances.
//!
//! A protocol instance is a passive state record: it is mutated exclusively
//! by handling input messages, may emit recipient-addressed output messages
//! while doing so, and eventually produces a final result. The [`StateMachine`]
//! wrapper owns a state, feeds messages to it, and keeps rejecting input once
//! the final result has been produced.

pub mod errors;
pub mod sm;
pub mod state;

pub use errors::{InvalidStateError, StateMachineError, StateUnavailableError};
pub use sm::{StateMachine, StateMachineOutput};
pub use state::{
    Recipient, RecipientMessage, StateMachineMessage, StateMachineState, StateMachineStateExt,
    StateMachineStateOutput, StateMachineStateResult,
};
