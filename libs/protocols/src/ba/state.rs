//! Binary agreement state machine.

use crate::config::ProtocolConfig;
use basic_types::{PartyId, PartyJar, PartyMessage};
use serde::{Deserialize, Serialize};
use state_machine::{
    state::{Recipient, StateMachineMessage},
    StateMachineState, StateMachineStateOutput, StateMachineStateResult,
};
use std::collections::{BTreeMap, BTreeSet};

/// Where the instance currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No local input yet; we tally but neither vote nor advance.
    AwaitingInput,

    /// Voting and tallying the given round with the given estimate.
    Round {
        /// The current round, starting at 1.
        round: u32,
        /// Our current estimate.
        estimate: bool,
    },

    /// The round tally tied; waiting for the beacon's coin.
    AwaitingCoin {
        /// The round whose coin we are waiting for.
        round: u32,
    },

    /// We announced a decision and wait for `f + 1` matching announcements.
    AwaitingDecideQuorum,
}

/// The agreement state definitions.
pub mod states {
    use super::Phase;
    use crate::config::ProtocolConfig;
    use basic_types::PartyJar;
    use std::collections::{BTreeMap, BTreeSet};

    /// The single long-lived voting state.
    pub struct Voting {
        /// The network parameters.
        pub config: ProtocolConfig,

        /// The phase within the round structure.
        pub phase: Phase,

        /// Votes received, per round.
        pub votes: BTreeMap<u32, PartyJar<bool>>,

        /// Decision announcements received.
        pub decides: PartyJar<bool>,

        /// Coin values received, per round.
        pub coins: BTreeMap<u32, bool>,

        /// Rounds we already voted in.
        pub voted_rounds: BTreeSet<u32>,

        /// Rounds we already requested the coin for.
        pub coin_requested: BTreeSet<u32>,

        /// Whether we announced our own decision.
        pub decide_sent: bool,
    }
}

/// The state machine for one binary agreement instance.
pub enum BaState {
    /// The instance tallies votes for its whole lifetime.
    Voting(states::Voting),
}

use BaState::*;

impl BaState {
    /// Constructs an instance with no input yet.
    ///
    /// The instance tallies whatever arrives and can even terminate through
    /// decide adoption before an input is ever provided.
    pub fn new(config: ProtocolConfig) -> Self {
        Voting(states::Voting {
            config,
            phase: Phase::AwaitingInput,
            votes: BTreeMap::new(),
            decides: PartyJar::new(),
            coins: BTreeMap::new(),
            voted_rounds: BTreeSet::new(),
            coin_requested: BTreeSet::new(),
            decide_sent: false,
        })
    }

    fn handle_message(self, message: PartyMessage<BaMessage>) -> StateMachineStateResult<Self> {
        let (sender, message) = message.into_parts();
        let Voting(mut state) = self;
        match message {
            BaMessage::Input(estimate) => {
                if state.phase == Phase::AwaitingInput {
                    state.phase = Phase::Round { round: 1, estimate };
                }
            }
            BaMessage::Vote { round, value } => {
                let _ = state.votes.entry(round).or_default().add_element(sender, value);
            }
            BaMessage::Decide(value) => {
                let _ = state.decides.add_element(sender, value);
            }
            BaMessage::Coin { round, value } => {
                state.coins.entry(round).or_insert(value);
            }
        }

        let mut messages = Vec::new();
        let decision = Self::progress(&mut state, &mut messages);
        let messages = messages
            .into_iter()
            .map(|contents| {
                StateMachineMessage::<Self>::new(
                    Recipient::Multiple(state.config.parties().to_vec()),
                    contents,
                )
            })
            .collect::<Vec<_>>();
        match decision {
            Some(value) => Ok(StateMachineStateOutput::Final(value)),
            None if messages.is_empty() => Ok(StateMachineStateOutput::Empty(Voting(state))),
            None => Ok(StateMachineStateOutput::Messages(Voting(state), messages)),
        }
    }

    /// Runs the round structure as far as the gathered evidence allows.
    ///
    /// Returns the decision only once our own announcement has looped back,
    /// so a final transition never has messages left to emit.
    fn progress(state: &mut states::Voting, out: &mut Vec<BaOutputMessage>) -> Option<bool> {
        loop {
            if let Some(value) = Self::decide_quorum(state) {
                if !state.decide_sent {
                    state.decide_sent = true;
                    out.push(BaOutputMessage::Decide(value));
                    // Our own announcement still has to loop back and join
                    // the quorum count.
                    return None;
                }
                return Some(value);
            }
            match state.phase {
                Phase::AwaitingInput | Phase::AwaitingDecideQuorum => return None,
                Phase::Round { round, estimate } => {
                    if state.voted_rounds.insert(round) {
                        out.push(BaOutputMessage::Vote { round, value: estimate });
                    }
                    let (ayes, nays) = Self::effective_votes(state, round);
                    if ayes + nays < state.config.quorum() {
                        return None;
                    }
                    // Every completed tally requests the round's coin, needed
                    // or not: a party that tied must be able to reach the
                    // beacon's f + 1 release threshold on honest requests
                    // alone.
                    if state.coin_requested.insert(round) {
                        out.push(BaOutputMessage::CoinRequest { round });
                    }
                    let unanimous = if ayes >= state.config.quorum() {
                        Some(true)
                    } else if nays >= state.config.quorum() {
                        Some(false)
                    } else {
                        None
                    };
                    if let Some(value) = unanimous {
                        state.decide_sent = true;
                        state.phase = Phase::AwaitingDecideQuorum;
                        out.push(BaOutputMessage::Decide(value));
                        continue;
                    }
                    // Adopt a majority only when it is unambiguous; a tally
                    // where both values reach `f + 1` falls back to the coin.
                    let ayes_major = ayes >= state.config.amplify();
                    let nays_major = nays >= state.config.amplify();
                    if ayes_major && !nays_major {
                        state.phase = Phase::Round { round: round + 1, estimate: true };
                    } else if nays_major && !ayes_major {
                        state.phase = Phase::Round { round: round + 1, estimate: false };
                    } else {
                        state.phase = Phase::AwaitingCoin { round };
                    }
                }
                Phase::AwaitingCoin { round } => match state.coins.get(&round) {
                    Some(value) => {
                        state.phase = Phase::Round { round: round + 1, estimate: *value };
                    }
                    None => return None,
                },
            }
        }
    }

    /// Counts round votes, with decision announcements standing in as the
    /// announcer's vote for every round it no longer votes in.
    fn effective_votes(state: &states::Voting, round: u32) -> (usize, usize) {
        let mut ayes = 0;
        let mut nays = 0;
        let votes = state.votes.get(&round);
        for party in state.config.parties() {
            let vote = votes
                .and_then(|jar| jar.get(party).copied())
                .or_else(|| state.decides.get(party).copied());
            match vote {
                Some(true) => ayes += 1,
                Some(false) => nays += 1,
                None => (),
            }
        }
        (ayes, nays)
    }

    fn decide_quorum(state: &states::Voting) -> Option<bool> {
        for value in [true, false] {
            if state.decides.matching_count(&value) >= state.config.amplify() {
                return Some(value);
            }
        }
        None
    }
}

impl StateMachineState for BaState {
    type RecipientId = PartyId;
    type InputMessage = PartyMessage<BaMessage>;
    type OutputMessage = BaOutputMessage;
    type FinalResult = bool;

    fn is_completed(&self) -> bool {
        let Voting(state) = self;
        state.decide_sent && Self::decide_quorum(state).is_some()
    }

    fn try_next(self) -> StateMachineStateResult<Self> {
        let Voting(state) = self;
        match Self::decide_quorum(&state).filter(|_| state.decide_sent) {
            Some(value) => Ok(StateMachineStateOutput::Final(value)),
            None => Ok(StateMachineStateOutput::Empty(Voting(state))),
        }
    }

    fn handle_message(self, message: Self::InputMessage) -> StateMachineStateResult<Self> {
        self.handle_message(message)
    }
}

/// An input message for one agreement instance.
///
/// `Input` and `Coin` never cross the network: the dispatcher injects them
/// locally when the enclosing protocol provides an estimate or the beacon
/// releases a value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BaMessage {
    /// Our own initial estimate.
    Input(bool),

    /// A vote for a round.
    Vote {
        /// The voting round.
        round: u32,
        /// The voted estimate.
        value: bool,
    },

    /// A decision announcement.
    Decide(bool),

    /// The beacon's coin for a round.
    Coin {
        /// The round the coin belongs to.
        round: u32,
        /// The coin value.
        value: bool,
    },
}

/// An output message emitted by one agreement instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BaOutputMessage {
    /// Broadcast a vote.
    Vote {
        /// The voting round.
        round: u32,
        /// The voted estimate.
        value: bool,
    },

    /// Broadcast a decision announcement.
    Decide(bool),

    /// Ask the beacon for the coin of a round.
    CoinRequest {
        /// The round the coin is for.
        round: u32,
    },
}
