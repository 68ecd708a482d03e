//! The sealed second-price auction circuit.
//!
//! A thin client of the primitives: bids enter through input sharings and a
//! common-set instance fixes the three active bidders; pairwise greater-than
//! gates compare bids through a masked open and a bitwise prefix scan;
//! winner and runner-up indicators are products of the pairwise results; and
//! the per-owner outputs leave through the mask-and-open output privacy
//! stage. Everything here is local arithmetic on shares plus instances of
//! the generic protocols.

pub mod driver;
pub mod gt;

pub use driver::AuctionDriver;
pub use gt::GtGate;
