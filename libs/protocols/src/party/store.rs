//! Per-party session storage and message dispatch.

use crate::{
    ba::{BaMessage, BaOutputMessage, BaState},
    config::ProtocolConfig,
    css::{CssMessage, CssOutput, CssState},
    envelope::{Envelope, Payload},
    rbc::{RbcMessage, RbcState, RbcValue},
    reveal::{RevealMessage, RevealMode, RevealOutputMessage, RevealState},
    session::SessionId,
};
use basic_types::{PartyId, PartyMessage};
use math_lib::modular::ModularNumber;
use rand_chacha::ChaCha20Rng;
use shamir_sharing::ShamirSecretSharer;
use state_machine::{
    errors::StateMachineError,
    state::{Recipient, RecipientMessage},
    StateMachine, StateMachineOutput,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, trace};

/// Where an outbound envelope is headed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// A protocol party.
    Party(PartyId),

    /// The beacon functionality.
    Beacon,
}

/// An envelope queued for the transport.
#[derive(Clone, Debug)]
pub struct OutboundMessage {
    /// The destination.
    pub to: Endpoint,

    /// The envelope itself.
    pub envelope: Envelope,
}

/// The wire type a dealt share travels under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareWire {
    /// A plain input sharing (`CSS_SHARE`).
    Input,

    /// A multiplication reshare (`MUL_RESHARE`).
    Reshare,
}

/// Owns every protocol instance of one party, keyed by session id.
///
/// Instances are created lazily on the first message that references their
/// session; completed instances record their result in a table the drivers
/// poll, and keep swallowing late duplicates. A version counter tracks every
/// observable mutation so the enclosing party can advance its drivers to a
/// fixpoint.
pub struct SessionStore {
    config: ProtocolConfig,
    local_id: PartyId,
    secret_sharer: Arc<ShamirSecretSharer>,
    rng: ChaCha20Rng,
    rbc: BTreeMap<SessionId, StateMachine<RbcState>>,
    ba: BTreeMap<SessionId, StateMachine<BaState>>,
    css: BTreeMap<SessionId, StateMachine<CssState>>,
    reveal: BTreeMap<SessionId, StateMachine<RevealState>>,
    rbc_results: BTreeMap<SessionId, RbcValue>,
    ba_results: BTreeMap<SessionId, bool>,
    css_results: BTreeMap<SessionId, CssOutput>,
    reveal_results: BTreeMap<SessionId, ModularNumber>,
    coin_routes: BTreeMap<SessionId, (SessionId, u32)>,
    outbox: Vec<OutboundMessage>,
    version: u64,
}

impl SessionStore {
    /// Constructs the store for one party.
    pub fn new(
        config: ProtocolConfig,
        local_id: PartyId,
        secret_sharer: Arc<ShamirSecretSharer>,
        rng: ChaCha20Rng,
    ) -> Self {
        Self {
            config,
            local_id,
            secret_sharer,
            rng,
            rbc: BTreeMap::new(),
            ba: BTreeMap::new(),
            css: BTreeMap::new(),
            reveal: BTreeMap::new(),
            rbc_results: BTreeMap::new(),
            ba_results: BTreeMap::new(),
            css_results: BTreeMap::new(),
            reveal_results: BTreeMap::new(),
            coin_routes: BTreeMap::new(),
            outbox: Vec::new(),
            version: 0,
        }
    }

    /// The network parameters.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Our own party id.
    pub fn local_id(&self) -> PartyId {
        self.local_id
    }

    /// The secret sharer bound to this party.
    pub fn secret_sharer(&self) -> &Arc<ShamirSecretSharer> {
        &self.secret_sharer
    }

    /// The mutation counter.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Records an observable mutation. Drivers call this when their own
    /// state changes so the fixpoint loop keeps running.
    pub fn bump(&mut self) {
        self.version += 1;
    }

    /// Samples a uniform field element from the party's stream.
    pub fn gen_random(&mut self) -> ModularNumber {
        ModularNumber::gen_random(&mut self.rng)
    }

    /// Takes everything queued for the transport.
    pub fn drain_outbox(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// A delivered broadcast value, if the instance delivered.
    pub fn rbc_result(&self, session: &SessionId) -> Option<&RbcValue> {
        self.rbc_results.get(session)
    }

    /// An agreement decision, if the instance decided.
    pub fn ba_result(&self, session: &SessionId) -> Option<bool> {
        self.ba_results.get(session).copied()
    }

    /// A finalized sharing, if the instance finalized.
    pub fn css_result(&self, session: &SessionId) -> Option<&CssOutput> {
        self.css_results.get(session)
    }

    /// An opened value, if the instance reconstructed.
    pub fn reveal_result(&self, session: &SessionId) -> Option<ModularNumber> {
        self.reveal_results.get(session).copied()
    }

    /// Routes one incoming envelope to its instance.
    pub fn handle_envelope(&mut self, envelope: Envelope) -> Result<(), StateMachineError> {
        let session = envelope.session.clone();
        trace!(party = %self.local_id, session = %session, kind = %envelope.payload.kind(), "dispatching envelope");
        match (envelope.sender_party(), envelope.payload) {
            (Some(sender), Payload::CssShare(share) | Payload::MulReshare(share)) => {
                self.feed_css(session, PartyMessage::new(sender, CssMessage::Share(share)))
            }
            (Some(sender), Payload::CssEcho(value)) => {
                self.feed_css(session, PartyMessage::new(sender, CssMessage::Echo(value)))
            }
            (Some(sender), Payload::CssReady(vid)) => {
                self.feed_css(session, PartyMessage::new(sender, CssMessage::Ready(vid)))
            }
            (Some(sender), Payload::RbcInit(value)) => {
                self.feed_rbc(session, PartyMessage::new(sender, RbcMessage::Init(value)))
            }
            (Some(sender), Payload::RbcEcho(value)) => {
                self.feed_rbc(session, PartyMessage::new(sender, RbcMessage::Echo(value)))
            }
            (Some(sender), Payload::RbcReady(value)) => {
                self.feed_rbc(session, PartyMessage::new(sender, RbcMessage::Ready(value)))
            }
            (Some(sender), Payload::BaVote { round, value }) => {
                self.feed_ba(session, PartyMessage::new(sender, BaMessage::Vote { round, value }))
            }
            (Some(sender), Payload::BaDecide(value)) => {
                self.feed_ba(session, PartyMessage::new(sender, BaMessage::Decide(value)))
            }
            (_, Payload::BeaconValue(value)) => {
                let Some((ba_session, round)) = self.coin_routes.get(&session).cloned() else {
                    return Ok(());
                };
                let value = ModularNumber::try_decode(&value)
                    .map_err(|e| anyhow::anyhow!("coin decoding: {e}"))?;
                let coin = BaMessage::Coin { round, value: value.into_value() & 1 == 1 };
                self.feed_ba(ba_session, PartyMessage::new(self.local_id, coin))
            }
            (Some(sender), Payload::MpcOpen(share) | Payload::MaskShare(share)) => {
                self.feed_reveal(session, PartyMessage::new(sender, RevealMessage::Share(share)))
            }
            // Requests target the beacon; a party receiving one (or a
            // beacon-originated protocol message) drops it.
            _ => Ok(()),
        }
    }

    /// Starts our own reliable broadcast for a session.
    ///
    /// A no-op when the instance already exists: nothing can reference the
    /// session before our init, so an existing instance means we already
    /// started it.
    pub fn start_rbc_sender(&mut self, session: SessionId, value: RbcValue) {
        if self.rbc.contains_key(&session) || self.rbc_results.contains_key(&session) {
            return;
        }
        trace!(party = %self.local_id, session = %session, "starting reliable broadcast");
        let (state, messages) =
            RbcState::new_as_sender(self.config.clone(), self.local_id, value);
        self.rbc.insert(session.clone(), StateMachine::new(state));
        self.push_rbc_messages(&session, messages);
        self.bump();
    }

    /// Provides our input to an agreement instance, if it still wants one.
    pub fn ba_input(&mut self, session: SessionId, estimate: bool) -> Result<(), StateMachineError> {
        let message = PartyMessage::new(self.local_id, BaMessage::Input(estimate));
        self.feed_ba(session, message)
    }

    /// Deals a secret into a new sharing session.
    ///
    /// A no-op if the session already exists; echoes and readies cannot
    /// precede the dealing, so an existing instance means we already dealt.
    pub fn css_deal(
        &mut self,
        session: SessionId,
        secret: &ModularNumber,
        wire: ShareWire,
    ) -> Result<(), StateMachineError> {
        if self.css.contains_key(&session) || self.css_results.contains_key(&session) {
            return Ok(());
        }
        trace!(party = %self.local_id, session = %session, ?wire, "dealing sharing session");
        let (state, messages) = CssState::new_as_dealer(
            self.config.clone(),
            self.secret_sharer.clone(),
            secret,
            &mut self.rng,
        );
        self.css.insert(session.clone(), StateMachine::new(state));
        for message in messages {
            let (recipient, contents) = message.into_parts();
            let payload = match (&contents, wire) {
                (CssMessage::Share(share), ShareWire::Input) => Payload::CssShare(*share),
                (CssMessage::Share(share), ShareWire::Reshare) => Payload::MulReshare(*share),
                _ => continue,
            };
            self.push_to_recipients(&session, recipient, payload);
        }
        self.bump();
        Ok(())
    }

    /// Provides our share of an opened value to a reveal session.
    pub fn reveal_input(
        &mut self,
        session: SessionId,
        mode: RevealMode,
        share: ModularNumber,
    ) -> Result<(), StateMachineError> {
        let message = RevealMessage::Input { mode, share: share.encode() };
        self.feed_reveal(session, PartyMessage::new(self.local_id, message))
    }

    fn feed_rbc(
        &mut self,
        session: SessionId,
        message: PartyMessage<RbcMessage>,
    ) -> Result<(), StateMachineError> {
        if self.rbc_results.contains_key(&session) {
            return Ok(());
        }
        let config = self.config.clone();
        let instance = self.rbc.entry(session.clone()).or_insert_with(|| {
            trace!(session = %session, "creating broadcast instance");
            StateMachine::new(RbcState::new(config, None))
        });
        if instance.is_finished() {
            return Ok(());
        }
        let output = instance.handle_message(message)?;
        match output {
            StateMachineOutput::Messages(messages) => self.push_rbc_messages(&session, messages),
            StateMachineOutput::Final(value) => {
                debug!(party = %self.local_id, session = %session, "broadcast delivered");
                self.rbc_results.insert(session, value);
                self.bump();
            }
            StateMachineOutput::Empty => (),
        }
        Ok(())
    }

    fn feed_ba(
        &mut self,
        session: SessionId,
        message: PartyMessage<BaMessage>,
    ) -> Result<(), StateMachineError> {
        if self.ba_results.contains_key(&session) {
            return Ok(());
        }
        let config = self.config.clone();
        let instance = self.ba.entry(session.clone()).or_insert_with(|| {
            trace!(session = %session, "creating agreement instance");
            StateMachine::new(BaState::new(config))
        });
        if instance.is_finished() {
            return Ok(());
        }
        let output = instance.handle_message(message)?;
        match output {
            StateMachineOutput::Messages(messages) => {
                for message in messages {
                    let (recipient, contents) = message.into_parts();
                    match contents {
                        BaOutputMessage::Vote { round, value } => self.push_to_recipients(
                            &session,
                            recipient,
                            Payload::BaVote { round, value },
                        ),
                        BaOutputMessage::Decide(value) => {
                            self.push_to_recipients(&session, recipient, Payload::BaDecide(value))
                        }
                        BaOutputMessage::CoinRequest { round } => {
                            let index = session.child(format!("coin-{round}"));
                            self.coin_routes.insert(index.clone(), (session.clone(), round));
                            self.push_outbound(OutboundMessage {
                                to: Endpoint::Beacon,
                                envelope: Envelope::new(
                                    self.local_id,
                                    index,
                                    Payload::BeaconRequest,
                                ),
                            });
                        }
                    }
                }
            }
            StateMachineOutput::Final(value) => {
                debug!(party = %self.local_id, session = %session, value, "agreement decided");
                self.ba_results.insert(session, value);
                self.bump();
            }
            StateMachineOutput::Empty => (),
        }
        Ok(())
    }

    fn feed_css(
        &mut self,
        session: SessionId,
        message: PartyMessage<CssMessage>,
    ) -> Result<(), StateMachineError> {
        if self.css_results.contains_key(&session) {
            return Ok(());
        }
        let config = self.config.clone();
        let sharer = self.secret_sharer.clone();
        let instance = self.css.entry(session.clone()).or_insert_with(|| {
            trace!(session = %session, "creating sharing instance");
            StateMachine::new(CssState::new(config, sharer, None))
        });
        if instance.is_finished() {
            return Ok(());
        }
        let output = instance.handle_message(message)?;
        match output {
            StateMachineOutput::Messages(messages) => {
                for message in messages {
                    let (recipient, contents) = message.into_parts();
                    let payload = match contents {
                        CssMessage::Echo(value) => Payload::CssEcho(value),
                        CssMessage::Ready(vid) => Payload::CssReady(vid),
                        // Direct shares are only emitted at dealing time.
                        CssMessage::Share(share) => Payload::CssShare(share),
                    };
                    self.push_to_recipients(&session, recipient, payload);
                }
            }
            StateMachineOutput::Final(output) => {
                debug!(party = %self.local_id, session = %session, vid = ?output.vid, "sharing finalized");
                self.css_results.insert(session, output);
                self.bump();
            }
            StateMachineOutput::Empty => (),
        }
        Ok(())
    }

    fn feed_reveal(
        &mut self,
        session: SessionId,
        message: PartyMessage<RevealMessage>,
    ) -> Result<(), StateMachineError> {
        if self.reveal_results.contains_key(&session) {
            return Ok(());
        }
        let config = self.config.clone();
        let sharer = self.secret_sharer.clone();
        let instance = self.reveal.entry(session.clone()).or_insert_with(|| {
            trace!(session = %session, "creating reveal instance");
            StateMachine::new(RevealState::new(config, sharer))
        });
        if instance.is_finished() {
            return Ok(());
        }
        let output = instance.handle_message(message)?;
        match output {
            StateMachineOutput::Messages(messages) => {
                for message in messages {
                    let (recipient, contents) = message.into_parts();
                    let payload = match contents {
                        RevealOutputMessage::Open(share) => Payload::MpcOpen(share),
                        RevealOutputMessage::Mask(share) => Payload::MaskShare(share),
                    };
                    self.push_to_recipients(&session, recipient, payload);
                }
            }
            StateMachineOutput::Final(value) => {
                debug!(party = %self.local_id, session = %session, "value reconstructed");
                self.reveal_results.insert(session, value);
                self.bump();
            }
            StateMachineOutput::Empty => (),
        }
        Ok(())
    }

    fn push_rbc_messages(
        &mut self,
        session: &SessionId,
        messages: Vec<RecipientMessage<PartyId, RbcMessage>>,
    ) {
        for message in messages {
            let (recipient, contents) = message.into_parts();
            let payload = match contents {
                RbcMessage::Init(value) => Payload::RbcInit(value),
                RbcMessage::Echo(value) => Payload::RbcEcho(value),
                RbcMessage::Ready(value) => Payload::RbcReady(value),
            };
            self.push_to_recipients(session, recipient, payload);
        }
    }

    fn push_to_recipients(
        &mut self,
        session: &SessionId,
        recipient: Recipient<PartyId>,
        payload: Payload,
    ) {
        let targets = match recipient {
            Recipient::Single(party) => vec![party],
            Recipient::Multiple(parties) => parties,
        };
        for target in targets {
            self.push_outbound(OutboundMessage {
                to: Endpoint::Party(target),
                envelope: Envelope::new(self.local_id, session.clone(), payload.clone()),
            });
        }
    }

    fn push_outbound(&mut self, message: OutboundMessage) {
        self.outbox.push(message);
        self.bump();
    }
}
