//! Share opening.
//!
//! Two flavors, mirroring who learns the value: a public open broadcasts
//! every share and reconstructs at `f + 1` everywhere, and a to-party open
//! sends shares privately so only the target reconstructs. Both tolerate an
//! omitter because a degree-`f` sharing needs only `f + 1` of the `n`
//! shares.

pub mod state;

pub use state::{RevealMessage, RevealMode, RevealOutputMessage, RevealState};
