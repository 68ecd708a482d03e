//! Degree-`f` Shamir secret sharing over the auction's fixed party set.

pub mod errors;
pub mod sharer;

pub use errors::{RecoverSecretError, ShamirError};
pub use sharer::{PartyShares, PolyDegree, ShamirSecretSharer};
