//! Complete secret sharing tests.

use super::state::{CssMessage, CssOutput, CssState};
use crate::config::ProtocolConfig;
use basic_types::{PartyId, PartyMessage};
use math_lib::modular::ModularNumber;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::ShamirSecretSharer;
use state_machine::{
    state::{Recipient, StateMachineMessage},
    StateMachine, StateMachineOutput,
};
use std::{collections::BTreeMap, collections::VecDeque, sync::Arc};

fn config() -> ProtocolConfig {
    ProtocolConfig::new(PartyId::all(4), 1)
}

fn sharer_for(party: PartyId) -> Arc<ShamirSecretSharer> {
    Arc::new(ShamirSecretSharer::new(party, 1, PartyId::all(4)).unwrap())
}

/// Runs a dealing among four in-memory instances, optionally dropping the
/// dealer's direct share to one party, and returns every finalization.
fn run_dealing(
    secret: u64,
    drop_share_to: Option<PartyId>,
) -> BTreeMap<PartyId, CssOutput> {
    let dealer = PartyId::new(1);
    let mut instances: BTreeMap<PartyId, StateMachine<CssState>> = BTreeMap::new();
    let mut queue: VecDeque<(PartyId, PartyId, CssMessage)> = VecDeque::new();

    let mut rng = ChaCha20Rng::seed_from_u64(secret);
    let secret = ModularNumber::from_u64(secret);
    for party in PartyId::all(4) {
        if party == dealer {
            let (state, messages) =
                CssState::new_as_dealer(config(), sharer_for(party), &secret, &mut rng);
            instances.insert(party, StateMachine::new(state));
            enqueue(&mut queue, party, messages);
        } else {
            let state = CssState::new(config(), sharer_for(party), Some(dealer));
            instances.insert(party, StateMachine::new(state));
        }
    }

    let mut outputs = BTreeMap::new();
    while let Some((from, to, message)) = queue.pop_front() {
        if matches!(&message, CssMessage::Share(_)) && Some(to) == drop_share_to {
            continue;
        }
        let instance = instances.get_mut(&to).unwrap();
        if instance.is_finished() {
            continue;
        }
        match instance.handle_message(PartyMessage::new(from, message)).unwrap() {
            StateMachineOutput::Messages(messages) => enqueue(&mut queue, to, messages),
            StateMachineOutput::Final(output) => {
                outputs.insert(to, output);
            }
            StateMachineOutput::Empty => (),
        }
    }
    outputs
}

fn enqueue(
    queue: &mut VecDeque<(PartyId, PartyId, CssMessage)>,
    from: PartyId,
    messages: Vec<StateMachineMessage<CssState>>,
) {
    for message in messages {
        let (recipient, contents) = message.into_parts();
        match recipient {
            Recipient::Single(to) => queue.push_back((from, to, contents)),
            Recipient::Multiple(parties) => {
                for to in parties {
                    queue.push_back((from, to, contents.clone()));
                }
            }
        }
    }
}

#[test]
fn every_party_finalizes_with_the_same_vid() {
    let outputs = run_dealing(1337, None);
    assert_eq!(outputs.len(), 4);
    let vid = outputs[&PartyId::new(1)].vid;
    assert!(outputs.values().all(|output| output.vid == vid));
}

#[test]
fn finalized_shares_reconstruct_the_secret() {
    let outputs = run_dealing(42, None);
    let sharer = sharer_for(PartyId::new(1));
    // Any f + 1 shares lie on the dealt polynomial.
    for pair in [[1u8, 2], [2, 4], [3, 4]] {
        let shares = pair.map(PartyId::new).map(|party| (party, outputs[&party].share));
        assert_eq!(sharer.recover(shares).unwrap(), ModularNumber::from_u64(42));
    }
}

#[test]
fn omitted_party_derives_its_share_from_echoes() {
    let skipped = PartyId::new(3);
    let outputs = run_dealing(99, Some(skipped));
    assert_eq!(outputs.len(), 4, "the skipped party must still finalize");
    let sharer = sharer_for(PartyId::new(1));
    let shares = [PartyId::new(2), skipped].map(|party| (party, outputs[&party].share));
    assert_eq!(sharer.recover(shares).unwrap(), ModularNumber::from_u64(99));
}

#[test]
fn inconsistent_echo_evidence_is_fatal() {
    let local = PartyId::new(4);
    let mut sm = StateMachine::new(CssState::new(config(), sharer_for(local), Some(PartyId::new(1))));
    // Three points that do not sit on any degree-1 polynomial.
    for (sender, value) in [(1u8, 1u64), (2, 2)] {
        let echo = CssMessage::Echo(ModularNumber::from_u64(value).encode());
        sm.handle_message(PartyMessage::new(PartyId::new(sender), echo)).unwrap();
    }
    let echo = CssMessage::Echo(ModularNumber::from_u64(4).encode());
    let result = sm.handle_message(PartyMessage::new(PartyId::new(3), echo));
    assert!(result.is_err());
}

#[test]
fn late_echo_is_checked_against_the_pinned_polynomial() {
    let local = PartyId::new(4);
    let mut sm = StateMachine::new(CssState::new(config(), sharer_for(local), Some(PartyId::new(1))));
    // Echoes on the line y = x pin the candidate.
    for (sender, value) in [(1u8, 1u64), (2, 2), (3, 3)] {
        let echo = CssMessage::Echo(ModularNumber::from_u64(value).encode());
        sm.handle_message(PartyMessage::new(PartyId::new(sender), echo)).unwrap();
    }
    // A late off-polynomial echo is inconsistent evidence.
    let echo = CssMessage::Echo(ModularNumber::from_u64(9).encode());
    let result = sm.handle_message(PartyMessage::new(PartyId::new(4), echo));
    assert!(result.is_err());
}
