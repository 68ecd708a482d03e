//! BGW share multiplication with degree reduction.
//!
//! Each party reshares its local share product through a fresh sharing
//! session whose dealer share travels as `MUL_RESHARE`, a dedicated
//! common-set instance agrees on `2f + 1` finalized reshares, and the
//! product share is the Lagrange recombination of the selected reshares at
//! zero. The result is again a degree-`f` sharing, so multiplications chain.

pub mod driver;

pub use driver::Mul;
