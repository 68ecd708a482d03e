//! Complete secret sharing.
//!
//! A dealer hands out a degree-`f` sharing; echoes and readies harden the
//! dealing until every honest party finalizes with its own share and a
//! binding value id. The vid digests the polynomial's canonical evaluation
//! points, so parties that observed different echo subsets still agree on
//! it, and a party whose direct share was omitted derives it from `f + 1`
//! echo points.
//!
//! The surface operations of the layer map onto the dispatcher: `share` is
//! dealer-side instance creation, `wait_finalized`/`get_share` read the
//! completion table, and `recover`/`recover_to_party` run a
//! [`reveal`](crate::reveal) session over the finalized share.

pub mod state;

#[cfg(test)]
mod test;

pub use state::{CssMessage, CssOutput, CssState, InvalidShare};
