//! Common-set driver tests.
//!
//! These drive a single party's store by injecting the envelopes its peers
//! would have sent; the full multi-party paths run in the simulator tests.

use super::driver::Acs;
use crate::{
    config::ProtocolConfig,
    envelope::{Envelope, MessageKind, Payload, Vid},
    party::store::{Endpoint, OutboundMessage, SessionStore},
    session::SessionId,
};
use basic_types::PartyId;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::ShamirSecretSharer;
use std::sync::Arc;

fn config() -> ProtocolConfig {
    ProtocolConfig::new(PartyId::all(4), 1)
}

fn make_store() -> SessionStore {
    let local = PartyId::new(1);
    let sharer = Arc::new(ShamirSecretSharer::new(local, 1, PartyId::all(4)).unwrap());
    SessionStore::new(config(), local, sharer, ChaCha20Rng::seed_from_u64(0))
}

fn make_acs() -> Acs {
    Acs::new(SessionId::root("auction").child("acs"), config())
}

fn vid(tag: u8) -> Vid {
    Vid::new([tag; 32])
}

/// Drives the store's broadcast instance for `dealer` to delivery.
fn deliver_proposal(store: &mut SessionStore, acs: &Acs, dealer: PartyId, value: Vid) {
    let session = acs.rbc_session(dealer);
    for sender in [2u8, 3, 4] {
        let envelope =
            Envelope::new(PartyId::new(sender), session.clone(), Payload::RbcReady(Some(value)));
        store.handle_envelope(envelope).unwrap();
    }
    assert!(store.rbc_result(&session).is_some());
}

/// Drives the store's agreement instance for `dealer` to a decision.
fn decide_inclusion(store: &mut SessionStore, acs: &Acs, dealer: PartyId, value: bool) {
    let session = acs.ba_session(dealer);
    // Two peer announcements reach the f + 1 quorum; our amplification loops
    // back like the transport would deliver it.
    for sender in [2u8, 3, 1] {
        let envelope =
            Envelope::new(PartyId::new(sender), session.clone(), Payload::BaDecide(value));
        store.handle_envelope(envelope).unwrap();
    }
    assert_eq!(store.ba_result(&session), Some(value));
}

fn sent_votes(outbox: &[OutboundMessage], session: &SessionId, value: bool) -> usize {
    outbox
        .iter()
        .filter(|message| {
            message.to == Endpoint::Party(PartyId::new(1))
                && &message.envelope.session == session
                && message.envelope.payload == Payload::BaVote { round: 1, value }
        })
        .count()
}

#[test]
fn delivered_proposal_feeds_a_one_input() {
    let mut store = make_store();
    let mut acs = make_acs();
    deliver_proposal(&mut store, &acs, PartyId::new(2), vid(2));
    acs.advance(&mut store).unwrap();

    let outbox = store.drain_outbox();
    assert_eq!(sent_votes(&outbox, &acs.ba_session(PartyId::new(2)), true), 1);
    // No other agreement saw an input.
    assert_eq!(sent_votes(&outbox, &acs.ba_session(PartyId::new(3)), true), 0);
    assert_eq!(sent_votes(&outbox, &acs.ba_session(PartyId::new(3)), false), 0);
}

#[test]
fn zero_inputs_wait_for_a_quorum_of_ones() {
    let mut store = make_store();
    let mut acs = make_acs();
    for dealer in [2u8, 3] {
        deliver_proposal(&mut store, &acs, PartyId::new(dealer), vid(dealer));
    }
    acs.advance(&mut store).unwrap();
    let outbox = store.drain_outbox();
    // Two inclusions decided is below n - f: dealer 4 must not get a zero.
    assert_eq!(sent_votes(&outbox, &acs.ba_session(PartyId::new(4)), false), 0);

    for dealer in [2u8, 3, 1] {
        decide_inclusion(&mut store, &acs, PartyId::new(dealer), true);
    }
    acs.advance(&mut store).unwrap();
    let outbox = store.drain_outbox();
    assert_eq!(sent_votes(&outbox, &acs.ba_session(PartyId::new(4)), false), 1);
    assert!(acs.output().is_none(), "the set is not fixed until every agreement decides");
}

#[test]
fn output_is_the_smallest_quorum_of_included_dealers() {
    let mut store = make_store();
    let mut acs = make_acs();
    for dealer in PartyId::all(4) {
        decide_inclusion(&mut store, &acs, dealer, true);
    }
    acs.advance(&mut store).unwrap();
    assert_eq!(acs.output().unwrap(), PartyId::all(3));
}

#[test]
fn excluded_dealer_is_not_part_of_the_output() {
    let mut store = make_store();
    let mut acs = make_acs();
    for dealer in [1u8, 3, 4] {
        decide_inclusion(&mut store, &acs, PartyId::new(dealer), true);
    }
    decide_inclusion(&mut store, &acs, PartyId::new(2), false);
    acs.advance(&mut store).unwrap();
    assert_eq!(acs.output().unwrap(), [1u8, 3, 4].map(PartyId::new));
}

#[test]
fn propose_starts_a_single_broadcast() {
    let mut store = make_store();
    let mut acs = make_acs();
    acs.propose(vid(1), &mut store);
    acs.propose(vid(9), &mut store);
    let outbox = store.drain_outbox();
    let inits: Vec<_> = outbox
        .iter()
        .filter(|message| message.envelope.payload.kind() == MessageKind::RbcInit)
        .collect();
    // One init per party, from a single proposal.
    assert_eq!(inits.len(), 4);
    assert!(inits
        .iter()
        .all(|message| message.envelope.payload == Payload::RbcInit(Some(vid(1)))));
}
