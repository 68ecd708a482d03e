//! The wire-level message model.

use crate::session::SessionId;
use basic_types::PartyId;
use math_lib::modular::EncodedModularNumber;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A binding identifier for a finalized sharing polynomial.
///
/// The digest of the polynomial's canonical evaluation points; two honest
/// parties that finalize the same dealer's sharing compute the same vid.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Vid([u8; 32]);

impl Vid {
    /// Wraps a digest.
    pub fn new(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Vid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Eight hex characters are plenty to tell vids apart in logs.
        write!(f, "Vid(")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

/// The originator of an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// A protocol party.
    Party(PartyId),

    /// The common-coin beacon functionality.
    Beacon,
}

/// The closed set of protocol messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// A dealer's direct share in a secret sharing session.
    CssShare(EncodedModularNumber),

    /// A party's echo of the share it received from the dealer.
    CssEcho(EncodedModularNumber),

    /// A party vouches that consistent echo evidence exists for this vid.
    CssReady(Vid),

    /// The broadcaster's initial value.
    RbcInit(Option<Vid>),

    /// Echo of a broadcast value.
    RbcEcho(Option<Vid>),

    /// Ready amplification of a broadcast value.
    RbcReady(Option<Vid>),

    /// A binary agreement vote for one round.
    BaVote {
        /// The voting round.
        round: u32,
        /// The voted estimate.
        value: bool,
    },

    /// A binary agreement decision announcement.
    BaDecide(bool),

    /// A request for the common coin at this envelope's session index.
    BeaconRequest,

    /// A released common-coin value.
    BeaconValue(EncodedModularNumber),

    /// A share published to open a value to everyone.
    MpcOpen(EncodedModularNumber),

    /// A dealer's direct share in a multiplication reshare session.
    MulReshare(EncodedModularNumber),

    /// A mask share sent privately to an output owner.
    MaskShare(EncodedModularNumber),
}

impl Payload {
    /// The message type discriminator.
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::CssShare(_) => MessageKind::CssShare,
            Payload::CssEcho(_) => MessageKind::CssEcho,
            Payload::CssReady(_) => MessageKind::CssReady,
            Payload::RbcInit(_) => MessageKind::RbcInit,
            Payload::RbcEcho(_) => MessageKind::RbcEcho,
            Payload::RbcReady(_) => MessageKind::RbcReady,
            Payload::BaVote { .. } => MessageKind::BaVote,
            Payload::BaDecide(_) => MessageKind::BaDecide,
            Payload::BeaconRequest => MessageKind::BeaconRequest,
            Payload::BeaconValue(_) => MessageKind::BeaconValue,
            Payload::MpcOpen(_) => MessageKind::MpcOpen,
            Payload::MulReshare(_) => MessageKind::MulReshare,
            Payload::MaskShare(_) => MessageKind::MaskShare,
        }
    }
}

/// The message type, without payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// `CSS_SHARE`.
    CssShare,
    /// `CSS_ECHO`.
    CssEcho,
    /// `CSS_READY`.
    CssReady,
    /// `RBC_INIT`.
    RbcInit,
    /// `RBC_ECHO`.
    RbcEcho,
    /// `RBC_READY`.
    RbcReady,
    /// `BA_VOTE`.
    BaVote,
    /// `BA_DECIDE`.
    BaDecide,
    /// `BEACON_REQUEST`.
    BeaconRequest,
    /// `BEACON_VALUE`.
    BeaconValue,
    /// `MPC_OPEN`.
    MpcOpen,
    /// `MUL_RESHARE`.
    MulReshare,
    /// `MASK_SHARE`.
    MaskShare,
}

impl MessageKind {
    /// Every message kind, in a stable order.
    pub fn all() -> [MessageKind; 13] {
        use MessageKind::*;
        [
            CssShare,
            CssEcho,
            CssReady,
            RbcInit,
            RbcEcho,
            RbcReady,
            BaVote,
            BaDecide,
            BeaconRequest,
            BeaconValue,
            MpcOpen,
            MulReshare,
            MaskShare,
        ]
    }
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::CssShare => "CSS_SHARE",
            MessageKind::CssEcho => "CSS_ECHO",
            MessageKind::CssReady => "CSS_READY",
            MessageKind::RbcInit => "RBC_INIT",
            MessageKind::RbcEcho => "RBC_ECHO",
            MessageKind::RbcReady => "RBC_READY",
            MessageKind::BaVote => "BA_VOTE",
            MessageKind::BaDecide => "BA_DECIDE",
            MessageKind::BeaconRequest => "BEACON_REQUEST",
            MessageKind::BeaconValue => "BEACON_VALUE",
            MessageKind::MpcOpen => "MPC_OPEN",
            MessageKind::MulReshare => "MUL_RESHARE",
            MessageKind::MaskShare => "MASK_SHARE",
        };
        write!(f, "{name}")
    }
}

/// A routed protocol message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Who produced this message.
    pub origin: Origin,

    /// The protocol instance this message targets.
    pub session: SessionId,

    /// The message itself.
    pub payload: Payload,
}

impl Envelope {
    /// Constructs a party-originated envelope.
    pub fn new(sender: PartyId, session: SessionId, payload: Payload) -> Self {
        Self { origin: Origin::Party(sender), session, payload }
    }

    /// The sending party, if the origin is a party.
    pub fn sender_party(&self) -> Option<PartyId> {
        match self.origin {
            Origin::Party(party) => Some(party),
            Origin::Beacon => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds_cover_the_closed_enum() {
        assert_eq!(MessageKind::all().len(), 13);
        let vote = Payload::BaVote { round: 1, value: true };
        assert_eq!(vote.kind(), MessageKind::BaVote);
        assert_eq!(vote.kind().to_string(), "BA_VOTE");
    }
}
