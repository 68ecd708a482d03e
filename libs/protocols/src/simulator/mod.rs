//! The in-process asynchronous network simulator.
//!
//! A discrete-event loop over virtual time: every envelope becomes a
//! delivery event at `now + delay`, the omission policy filters the faulty
//! party's outbound traffic, and the beacon functionality lives beside the
//! parties as its own endpoint. Delivery order is `(time, sequence)`, so
//! runs are deterministic for a fixed seed and nothing is FIFO unless the
//! delay model makes it so.

pub mod delay;
pub mod metrics;
pub mod omission;

pub use delay::DelayModel;
pub use metrics::RunMetrics;
pub use omission::OmissionPolicy;

use crate::{
    beacon::Beacon,
    config::ProtocolConfig,
    envelope::{Envelope, Payload},
    party::{
        store::{Endpoint, OutboundMessage},
        Party,
    },
    preprocessing,
};
use basic_types::PartyId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::{
    cmp::Reverse,
    collections::{BTreeMap, BinaryHeap},
    time::Instant,
};
use tracing::{debug, trace};

/// Harness options for one run.
#[derive(Clone, Debug)]
pub struct SimulatorOptions {
    /// The master seed every random stream derives from.
    pub seed: u64,

    /// The transport delay model.
    pub delay: DelayModel,

    /// The omission fault to inject, if any.
    pub omission: Option<OmissionPolicy>,

    /// The delivery budget before the run aborts.
    pub max_events: u64,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self { seed: 0, delay: DelayModel::default(), omission: None, max_events: 2_000_000 }
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Each completed party's output, as a non-negative integer.
    pub outputs: BTreeMap<PartyId, u128>,

    /// The active bidder set the parties agreed on.
    pub active_set: Vec<PartyId>,

    /// Collected counters.
    pub metrics: RunMetrics,
}

/// A failed run.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// The delivery budget ran out before every honest party finished.
    #[error("event budget of {budget} deliveries exhausted")]
    BudgetExhausted {
        /// The configured budget.
        budget: u64,
    },

    /// The network went quiet before every honest party finished; outside
    /// the fault model this cannot happen.
    #[error("no deliveries left but parties {missing:?} have no output")]
    Stalled {
        /// The parties without an output.
        missing: Vec<PartyId>,
    },

    /// A party hit an unrecoverable protocol error.
    #[error(transparent)]
    Party(#[from] anyhow::Error),
}

/// One queued delivery.
#[derive(Debug)]
struct Delivery {
    at: u64,
    seq: u64,
    to: Endpoint,
    envelope: Envelope,
}

impl PartialEq for Delivery {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for Delivery {}

impl PartialOrd for Delivery {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delivery {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// The auction network simulator.
pub struct AuctionSimulator {
    config: ProtocolConfig,
    parties: BTreeMap<PartyId, Party>,
    beacon: Beacon,
    queue: BinaryHeap<Reverse<Delivery>>,
    delay: DelayModel,
    omission: Option<OmissionPolicy>,
    transport_rng: ChaCha20Rng,
    now: u64,
    seq: u64,
    max_events: u64,
    metrics: RunMetrics,
}

impl AuctionSimulator {
    /// Builds the network for the given bids.
    ///
    /// Bids map every party to a value in `[0, 32)`; all bids must be
    /// distinct for the auction circuit's indicators to be well defined.
    pub fn new(
        bids: &BTreeMap<PartyId, u64>,
        options: SimulatorOptions,
    ) -> Result<Self, SimulationError> {
        let parties: Vec<PartyId> = bids.keys().copied().collect();
        let config = ProtocolConfig::new(parties.clone(), 1);
        let mut master = ChaCha20Rng::seed_from_u64(options.seed);
        let mut preprocessing_rng = ChaCha20Rng::seed_from_u64(master.gen());
        let beacon_rng = ChaCha20Rng::seed_from_u64(master.gen());
        let transport_rng = ChaCha20Rng::seed_from_u64(master.gen());

        let mut banks = preprocessing::deal_banks(&config, &mut preprocessing_rng)
            .map_err(|e| anyhow::anyhow!("preprocessing: {e}"))?;
        let mut instances = BTreeMap::new();
        for party in &parties {
            let rng = ChaCha20Rng::seed_from_u64(master.gen());
            let bank = banks.remove(party).unwrap_or_default();
            let instance = Party::new(config.clone(), *party, bids[party], bank, rng)
                .map_err(|e| anyhow::anyhow!("party setup: {e}"))?;
            instances.insert(*party, instance);
        }

        Ok(Self {
            config: config.clone(),
            parties: instances,
            beacon: Beacon::new(config.amplify(), beacon_rng),
            queue: BinaryHeap::new(),
            delay: options.delay,
            omission: options.omission,
            transport_rng,
            now: 0,
            seq: 0,
            max_events: options.max_events,
            metrics: RunMetrics::default(),
        })
    }

    /// The parties not designated as the omitter.
    pub fn honest_parties(&self) -> Vec<PartyId> {
        let omitter = self.omission.as_ref().map(OmissionPolicy::party);
        self.config.parties().iter().copied().filter(|party| Some(*party) != omitter).collect()
    }

    /// Runs the protocol until every honest party has an output.
    pub fn run(&mut self) -> Result<RunOutcome, SimulationError> {
        let started = Instant::now();
        let honest = self.honest_parties();
        let mut outputs: BTreeMap<PartyId, u128> = BTreeMap::new();

        for party in self.config.parties().to_vec() {
            let outbound = self
                .parties
                .get_mut(&party)
                .map(Party::bootstrap)
                .transpose()?
                .unwrap_or_default();
            self.dispatch(outbound);
        }

        while let Some(Reverse(delivery)) = self.queue.pop() {
            self.now = delivery.at;
            self.metrics.events_delivered += 1;
            if self.metrics.events_delivered > self.max_events {
                return Err(SimulationError::BudgetExhausted { budget: self.max_events });
            }

            match delivery.to {
                Endpoint::Beacon => {
                    if let (Some(requester), Payload::BeaconRequest) =
                        (delivery.envelope.sender_party(), &delivery.envelope.payload)
                    {
                        trace!(index = %delivery.envelope.session, party = %requester, "beacon request");
                        let released =
                            self.beacon.handle_request(delivery.envelope.session, requester);
                        let outbound = released
                            .into_iter()
                            .map(|(party, envelope)| OutboundMessage {
                                to: Endpoint::Party(party),
                                envelope,
                            })
                            .collect();
                        self.dispatch(outbound);
                    }
                }
                Endpoint::Party(party) => {
                    let Some(instance) = self.parties.get_mut(&party) else {
                        continue;
                    };
                    let outbound = instance.handle_envelope(delivery.envelope)?;
                    if let Some(output) = instance.output() {
                        if !outputs.contains_key(&party) {
                            debug!(%party, %output, "party completed");
                            outputs.insert(party, output);
                        }
                    }
                    self.dispatch(outbound);
                }
            }

            if honest.iter().all(|party| outputs.contains_key(party)) {
                return Ok(self.finish(outputs, started));
            }
        }

        let missing =
            honest.into_iter().filter(|party| !outputs.contains_key(party)).collect();
        Err(SimulationError::Stalled { missing })
    }

    fn finish(&mut self, outputs: BTreeMap<PartyId, u128>, started: Instant) -> RunOutcome {
        self.metrics.beacon_samples = self.beacon.samples();
        self.metrics.multiplications = self
            .parties
            .values()
            .map(|party| party.multiplication_count() as u64)
            .max()
            .unwrap_or(0);
        self.metrics.virtual_time_micros = self.now;
        self.metrics.wall_time = started.elapsed();
        let active_set = self
            .parties
            .values()
            .find_map(|party| party.active_set())
            .map(<[PartyId]>::to_vec)
            .unwrap_or_default();
        RunOutcome { outputs, active_set, metrics: self.metrics.clone() }
    }

    /// Applies omission and delay to freshly sent envelopes.
    fn dispatch(&mut self, outbound: Vec<OutboundMessage>) {
        for message in outbound {
            let kind = message.envelope.payload.kind();
            let sender = message.envelope.sender_party();
            self.metrics.record_send(kind);
            if let (Some(policy), Some(sender)) = (&self.omission, sender) {
                // Beacon value releases are the functionality speaking, not
                // a party; only party-originated traffic can be omitted.
                if policy.should_drop(sender, kind, self.now, &mut self.transport_rng) {
                    self.metrics.messages_dropped += 1;
                    trace!(%sender, %kind, "omitted");
                    continue;
                }
            }
            let delay = self.delay.sample(sender, &mut self.transport_rng);
            self.seq += 1;
            self.queue.push(Reverse(Delivery {
                at: self.now + delay,
                seq: self.seq,
                to: message.to,
                envelope: message.envelope,
            }));
        }
    }
}
