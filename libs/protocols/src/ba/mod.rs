//! Randomized binary agreement.
//!
//! Ben-Or style rounds: vote, tally at `n - f`, decide on a unanimous
//! quorum, adopt an `f + 1` majority, otherwise fall back to the common
//! coin. A decision announcement doubles as that party's vote in every later
//! round, and `f + 1` matching announcements let any party adopt the
//! decision directly, which is what terminates stragglers.
//!
//! Safety is unconditional under omissions; termination holds with
//! probability one through the beacon.

pub mod state;


pub use state::{BaMessage, BaOutputMessage, BaState};
