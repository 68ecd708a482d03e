//! Error definitions for the sharing layer.

use math_lib::errors::InterpolationError;

/// A sharer could not be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ShamirError {
    /// The polynomial degree does not leave room for reconstruction.
    #[error("polynomial degree too high for the party count")]
    TooHighDegree,

    /// The party set contains a repeated id.
    #[error("duplicate party id")]
    DuplicateParty,
}

/// Secret recovery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecoverSecretError {
    /// Fewer shares than the polynomial degree allows recovering from.
    #[error("expected at least {required} shares, found {found}")]
    NotEnoughShares {
        /// The reconstruction threshold.
        required: usize,
        /// The number of shares provided.
        found: usize,
    },

    /// The underlying interpolation failed.
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
}
