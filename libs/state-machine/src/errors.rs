//! State machine error definitions.

/// The state is not available for inspection or mutation.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("state unavailable: {0}")]
pub struct StateUnavailableError(pub &'static str);

/// An output conversion was applied to the wrong output variant.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("output is not of the requested kind")]
pub struct InvalidStateError;

/// An error during message handling.
#[derive(Debug, thiserror::Error)]
pub enum StateMachineError {
    /// A message was received that this protocol cannot accept.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(&'static str),

    /// The underlying state was unavailable.
    #[error(transparent)]
    StateUnavailable(#[from] StateUnavailableError),

    /// A protocol-specific unrecoverable error.
    #[error("unexpected error: {0}")]
    UnexpectedError(#[from] anyhow::Error),
}
