//! Run metrics.

use crate::envelope::MessageKind;
use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    time::Duration,
};

/// Counters collected over one simulated run.
#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Envelopes handed to the transport, including later-dropped ones.
    pub messages_sent: u64,

    /// Sent envelopes by message type.
    pub sent_by_kind: BTreeMap<MessageKind, u64>,

    /// Envelopes discarded by the omission policy.
    pub messages_dropped: u64,

    /// Deliveries processed by the event loop.
    pub events_delivered: u64,

    /// Coin values sampled by the beacon.
    pub beacon_samples: u64,

    /// Multiplication gates evaluated per party.
    pub multiplications: u64,

    /// Virtual time at completion.
    pub virtual_time_micros: u64,

    /// Wall-clock time to completion.
    pub wall_time: Duration,
}

impl RunMetrics {
    pub(crate) fn record_send(&mut self, kind: MessageKind) {
        self.messages_sent += 1;
        *self.sent_by_kind.entry(kind).or_default() += 1;
    }
}

impl Display for RunMetrics {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "messages sent: {}", self.messages_sent)?;
        for (kind, count) in &self.sent_by_kind {
            writeln!(f, "  {kind}: {count}")?;
        }
        writeln!(f, "messages dropped: {}", self.messages_dropped)?;
        writeln!(f, "events delivered: {}", self.events_delivered)?;
        writeln!(f, "beacon samples: {}", self.beacon_samples)?;
        writeln!(f, "multiplication gates: {}", self.multiplications)?;
        writeln!(f, "virtual time: {}us", self.virtual_time_micros)?;
        write!(f, "wall time: {:?}", self.wall_time)
    }
}
