//! Shared basic types for the auction network.

pub mod jar;
pub mod party;

pub use jar::PartyJar;
pub use party::{PartyId, PartyMessage};
