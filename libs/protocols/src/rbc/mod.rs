//! Bracha reliable broadcast.
//!
//! One instance per `(sender, tag)`. The designated sender broadcasts an
//! init, every party echoes it, readies amplify at `f + 1` and delivery
//! happens at `n - f` matching readies. Under at most `f` omitters, if any
//! honest party delivers a value then every honest party eventually delivers
//! that same value, and at most one value is ever delivered.

pub mod state;

pub use state::{RbcMessage, RbcState, RbcValue};
