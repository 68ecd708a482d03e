//! Transport delay models.

use basic_types::PartyId;
use rand::Rng;
use std::collections::BTreeMap;

/// How long an envelope spends in flight, in virtual microseconds.
///
/// Nothing downstream assumes FIFO delivery: two messages on the same
/// channel may be reordered by any non-degenerate model.
#[derive(Clone, Debug)]
pub enum DelayModel {
    /// Every delivery takes the same time.
    Fixed {
        /// The constant delay.
        micros: u64,
    },

    /// Uniform in `[low, high]`.
    Uniform {
        /// Lower bound.
        low_micros: u64,
        /// Upper bound, inclusive.
        high_micros: u64,
    },

    /// Exponentially distributed.
    Exponential {
        /// The distribution mean.
        mean_micros: u64,
    },

    /// A replayed per-sender trace: every message from a listed sender is
    /// slowed by its recorded extra delay, on top of a uniform jitter that
    /// keeps delivery order non-degenerate.
    Adversarial {
        /// The jitter bound applied to every delivery.
        jitter_micros: u64,
        /// Extra delay per sending party.
        per_sender_micros: BTreeMap<PartyId, u64>,
    },
}

impl Default for DelayModel {
    fn default() -> Self {
        DelayModel::Uniform { low_micros: 500, high_micros: 15_000 }
    }
}

impl DelayModel {
    /// Samples the in-flight time of one delivery.
    pub fn sample<R: Rng>(&self, sender: Option<PartyId>, rng: &mut R) -> u64 {
        match self {
            DelayModel::Fixed { micros } => *micros,
            DelayModel::Uniform { low_micros, high_micros } => {
                rng.gen_range(*low_micros..=(*high_micros).max(*low_micros))
            }
            DelayModel::Exponential { mean_micros } => {
                let uniform: f64 = rng.gen();
                // Inverse CDF; clamp away from ln(0).
                let exp = -(1.0 - uniform).max(f64::MIN_POSITIVE).ln();
                (exp * *mean_micros as f64) as u64
            }
            DelayModel::Adversarial { jitter_micros, per_sender_micros } => {
                let extra =
                    sender.and_then(|party| per_sender_micros.get(&party)).copied().unwrap_or(0);
                rng.gen_range(0..=*jitter_micros) + extra
            }
        }
    }
}
