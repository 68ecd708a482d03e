//! Error definitions for the math kernel.

/// An attempt to invert (or divide by) zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("division by zero")]
pub struct DivByZero;

/// An encoded field element could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The encoding does not represent a canonical residue.
    #[error("value is not a canonical residue mod 2^127 - 1")]
    ValueTooLarge,

    /// The encoding has the wrong length.
    #[error("expected 16 bytes, found {0}")]
    InvalidLength(usize),
}

/// Interpolation over a point set failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InterpolationError {
    /// Two points share an abscissa.
    #[error("duplicate abscissa in interpolation set")]
    DuplicateAbscissa,

    /// A point's abscissa is not part of the precomputed set.
    #[error("abscissa not found in precomputed coefficients")]
    UnknownAbscissa,

    /// An abscissa was zero or a difference degenerated to zero.
    #[error(transparent)]
    DivByZero(#[from] DivByZero),
}
