//! The per-party auction orchestrator.

use crate::{
    acs::Acs,
    auction::gt::{ensure_mul, GtGate},
    config::ProtocolConfig,
    mul::Mul,
    party::store::{SessionStore, ShareWire},
    preprocessing::RandomBitBank,
    reveal::RevealMode,
    session::SessionId,
};
use anyhow::{anyhow, Context};
use basic_types::PartyId;
use itertools::Itertools;
use math_lib::modular::ModularNumber;
use std::collections::{BTreeMap, BTreeSet};

/// Drives one party through the auction phases.
///
/// Input sharing and the active-set agreement, then the comparison gates,
/// the winner/runner-up indicator products, the second-price derivation,
/// and finally the mask-and-open output stage. Every step is guarded and
/// idempotent; the party advances the driver to a fixpoint after each
/// delivered message.
pub struct AuctionDriver {
    session: SessionId,
    config: ProtocolConfig,
    bid: u64,
    bank: RandomBitBank,
    dealt_input: bool,
    proposed_input: bool,
    active_set: Option<Vec<PartyId>>,
    input_shares: Option<BTreeMap<PartyId, ModularNumber>>,
    gates: BTreeMap<(PartyId, PartyId), GtGate>,
    gates_created: bool,
    indicators_started: bool,
    indicators: Option<Indicators>,
    price_started: bool,
    price_share: Option<ModularNumber>,
    out_muls_started: bool,
    output_shares: Option<BTreeMap<PartyId, ModularNumber>>,
    masks_dealt: bool,
    masks_proposed: BTreeSet<PartyId>,
    mask_shares: BTreeMap<PartyId, ModularNumber>,
    opened_outputs: BTreeSet<PartyId>,
    result: Option<ModularNumber>,
}

/// Our shares of the winner and loser indicators, per active bidder.
struct Indicators {
    is_max: BTreeMap<PartyId, ModularNumber>,
    is_min: BTreeMap<PartyId, ModularNumber>,
}

impl AuctionDriver {
    /// Constructs the driver for one party's bid.
    pub fn new(config: ProtocolConfig, bid: u64, bank: RandomBitBank) -> Self {
        Self {
            session: SessionId::root("auction"),
            config,
            bid,
            bank,
            dealt_input: false,
            proposed_input: false,
            active_set: None,
            input_shares: None,
            gates: BTreeMap::new(),
            gates_created: false,
            indicators_started: false,
            indicators: None,
            price_started: false,
            price_share: None,
            out_muls_started: false,
            output_shares: None,
            masks_dealt: false,
            masks_proposed: BTreeSet::new(),
            mask_shares: BTreeMap::new(),
            opened_outputs: BTreeSet::new(),
            result: None,
        }
    }

    /// Our final output: the second price if we won, zero otherwise.
    pub fn result(&self) -> Option<ModularNumber> {
        self.result
    }

    /// The agreed set of active bidders, once decided.
    pub fn active_set(&self) -> Option<&[PartyId]> {
        self.active_set.as_deref()
    }

    fn input_css_session(&self, dealer: PartyId) -> SessionId {
        self.session.child(format!("input/css-{}", dealer.index()))
    }

    fn input_acs_session(&self) -> SessionId {
        self.session.child("input/acs")
    }

    fn gt_session(&self, left: PartyId, right: PartyId) -> SessionId {
        self.session.child(format!("gt-{}-{}", left.index(), right.index()))
    }

    fn indicator_session(&self, kind: &str, member: PartyId) -> SessionId {
        self.session.child(format!("{kind}-{}", member.index()))
    }

    fn mask_css_session(&self, owner: PartyId, dealer: PartyId) -> SessionId {
        self.session.child(format!("out-{}/mask-{}", owner.index(), dealer.index()))
    }

    fn mask_acs_session(&self, owner: PartyId) -> SessionId {
        self.session.child(format!("out-{}/acs", owner.index()))
    }

    fn output_open_session(&self, owner: PartyId) -> SessionId {
        self.session.child(format!("out-{}/open", owner.index()))
    }

    fn output_unmask_session(&self, owner: PartyId) -> SessionId {
        self.session.child(format!("out-{}/unmask", owner.index()))
    }

    /// Advances every phase as far as local evidence allows.
    pub fn advance(
        &mut self,
        store: &mut SessionStore,
        acs: &mut BTreeMap<SessionId, Acs>,
        muls: &mut BTreeMap<SessionId, Mul>,
    ) -> anyhow::Result<()> {
        self.advance_input(store, acs)?;
        self.advance_comparisons(store, acs, muls)?;
        self.advance_indicators(store, acs, muls)?;
        self.advance_price(store, acs, muls)?;
        self.advance_outputs(store, acs)?;
        Ok(())
    }

    fn advance_input(
        &mut self,
        store: &mut SessionStore,
        acs: &mut BTreeMap<SessionId, Acs>,
    ) -> anyhow::Result<()> {
        let local = store.local_id();
        if !self.dealt_input {
            self.dealt_input = true;
            let bid = ModularNumber::from_u64(self.bid);
            store
                .css_deal(self.input_css_session(local), &bid, ShareWire::Input)
                .context("dealing our bid")?;
            let session = self.input_acs_session();
            acs.entry(session.clone()).or_insert_with(|| Acs::new(session, self.config.clone()));
            store.bump();
        }
        if !self.proposed_input {
            if let Some(output) = store.css_result(&self.input_css_session(local)) {
                let vid = output.vid;
                self.proposed_input = true;
                if let Some(instance) = acs.get_mut(&self.input_acs_session()) {
                    instance.propose(vid, store);
                }
                store.bump();
            }
        }
        if self.active_set.is_none() {
            if let Some(set) = acs.get(&self.input_acs_session()).and_then(Acs::output) {
                self.active_set = Some(set.to_vec());
                store.bump();
            }
        }
        if let (Some(set), None) = (&self.active_set, &self.input_shares) {
            let mut shares = BTreeMap::new();
            for dealer in set {
                match store.css_result(&self.input_css_session(*dealer)) {
                    Some(output) => {
                        shares.insert(*dealer, output.share);
                    }
                    None => return Ok(()),
                }
            }
            self.input_shares = Some(shares);
            store.bump();
        }
        Ok(())
    }

    fn advance_comparisons(
        &mut self,
        store: &mut SessionStore,
        acs: &mut BTreeMap<SessionId, Acs>,
        muls: &mut BTreeMap<SessionId, Mul>,
    ) -> anyhow::Result<()> {
        if !self.gates_created {
            let (Some(set), Some(shares)) = (&self.active_set, &self.input_shares) else {
                return Ok(());
            };
            self.gates_created = true;
            for (left, right) in set.iter().copied().tuple_combinations() {
                let bundle = self
                    .bank
                    .bundle(left, right)
                    .ok_or_else(|| anyhow!("missing mask bits for {left}/{right}"))?;
                let gate = GtGate::new(
                    self.gt_session(left, right),
                    shares[&left],
                    shares[&right],
                    bundle.to_vec(),
                );
                self.gates.insert((left, right), gate);
            }
            store.bump();
        }
        for gate in self.gates.values_mut() {
            gate.advance(store, acs, muls, &self.config)?;
        }
        Ok(())
    }

    /// One multiplication per winner indicator and one per loser indicator.
    ///
    /// For active bidders `a < b < c` with `g_xy = [x_x >= x_y]`:
    /// `max_a = g_ab * g_ac`, `max_b = (1 - g_ab) * g_bc`,
    /// `max_c = (1 - g_ac) * (1 - g_bc)`, and the min products mirror them.
    fn advance_indicators(
        &mut self,
        store: &mut SessionStore,
        acs: &mut BTreeMap<SessionId, Acs>,
        muls: &mut BTreeMap<SessionId, Mul>,
    ) -> anyhow::Result<()> {
        let Some(set) = self.active_set.clone() else {
            return Ok(());
        };
        if !self.gates_created || self.gates.values().any(|gate| gate.result().is_none()) {
            return Ok(());
        }
        let &[a, b, c] = set.as_slice() else {
            return Err(anyhow!("active set must have exactly three members"));
        };
        let one = ModularNumber::ONE;
        let g_ab = self.gate_result(a, b)?;
        let g_ac = self.gate_result(a, c)?;
        let g_bc = self.gate_result(b, c)?;
        if !self.indicators_started {
            self.indicators_started = true;
            let products = [
                ("max", a, g_ab, g_ac),
                ("max", b, one - g_ab, g_bc),
                ("max", c, one - g_ac, one - g_bc),
                ("min", a, one - g_ab, one - g_ac),
                ("min", b, g_ab, one - g_bc),
                ("min", c, g_ac, g_bc),
            ];
            for (kind, member, left, right) in products {
                let session = self.indicator_session(kind, member);
                ensure_mul(muls, acs, &self.config, session, left, right);
            }
            store.bump();
        }
        if self.indicators.is_none() {
            let mut is_max = BTreeMap::new();
            let mut is_min = BTreeMap::new();
            for member in [a, b, c] {
                let max_session = self.indicator_session("max", member);
                let min_session = self.indicator_session("min", member);
                match (
                    muls.get(&max_session).and_then(Mul::result),
                    muls.get(&min_session).and_then(Mul::result),
                ) {
                    (Some(max_share), Some(min_share)) => {
                        is_max.insert(member, max_share);
                        is_min.insert(member, min_share);
                    }
                    _ => return Ok(()),
                }
            }
            self.indicators = Some(Indicators { is_max, is_min });
            store.bump();
        }
        Ok(())
    }

    /// `price = sum_i is_second_i * x_i`, then `o_i = is_max_i * price`.
    fn advance_price(
        &mut self,
        store: &mut SessionStore,
        acs: &mut BTreeMap<SessionId, Acs>,
        muls: &mut BTreeMap<SessionId, Mul>,
    ) -> anyhow::Result<()> {
        let Some(indicators) = &self.indicators else {
            return Ok(());
        };
        let (Some(set), Some(shares)) = (self.active_set.clone(), &self.input_shares) else {
            return Ok(());
        };
        if !self.price_started {
            self.price_started = true;
            for member in &set {
                let is_second = ModularNumber::ONE
                    - indicators.is_max[member]
                    - indicators.is_min[member];
                let session = self.indicator_session("price", *member);
                ensure_mul(muls, acs, &self.config, session, is_second, shares[member]);
            }
            store.bump();
        }
        if self.price_share.is_none() {
            let mut price = ModularNumber::ZERO;
            for member in &set {
                match muls.get(&self.indicator_session("price", *member)).and_then(Mul::result) {
                    Some(share) => price = price + share,
                    None => return Ok(()),
                }
            }
            self.price_share = Some(price);
            store.bump();
        }
        let Some(price) = self.price_share else {
            return Ok(());
        };
        if !self.out_muls_started {
            self.out_muls_started = true;
            for member in &set {
                let session = self.indicator_session("outmul", *member);
                ensure_mul(muls, acs, &self.config, session, indicators.is_max[member], price);
            }
            store.bump();
        }
        if self.output_shares.is_none() {
            let mut outputs = BTreeMap::new();
            for owner in self.config.parties() {
                if set.contains(owner) {
                    match muls.get(&self.indicator_session("outmul", *owner)).and_then(Mul::result)
                    {
                        Some(share) => {
                            outputs.insert(*owner, share);
                        }
                        None => return Ok(()),
                    }
                } else {
                    // Excluded bidders learn zero; the all-zero sharing is a
                    // valid degree-f sharing of it and the mask hides it.
                    outputs.insert(*owner, ModularNumber::ZERO);
                }
            }
            self.output_shares = Some(outputs);
            store.bump();
        }
        Ok(())
    }

    /// The §output stage: per-owner masks, public open of the masked value,
    /// private unmask to the owner.
    fn advance_outputs(
        &mut self,
        store: &mut SessionStore,
        acs: &mut BTreeMap<SessionId, Acs>,
    ) -> anyhow::Result<()> {
        let local = store.local_id();
        let Some(outputs) = self.output_shares.clone() else {
            return Ok(());
        };
        if !self.masks_dealt {
            self.masks_dealt = true;
            for owner in self.config.parties() {
                let contribution = store.gen_random();
                store
                    .css_deal(self.mask_css_session(*owner, local), &contribution, ShareWire::Input)
                    .context("dealing mask contribution")?;
                let session = self.mask_acs_session(*owner);
                acs.entry(session.clone())
                    .or_insert_with(|| Acs::new(session, self.config.clone()));
            }
            store.bump();
        }
        for owner in self.config.parties().to_vec() {
            if !self.masks_proposed.contains(&owner) {
                if let Some(output) = store.css_result(&self.mask_css_session(owner, local)) {
                    let vid = output.vid;
                    self.masks_proposed.insert(owner);
                    if let Some(instance) = acs.get_mut(&self.mask_acs_session(owner)) {
                        instance.propose(vid, store);
                    }
                    store.bump();
                }
            }
            // The mask is the sum of the contributions the common set kept;
            // a dealer that dropped out mid-run is excluded here rather than
            // wedging the whole output stage.
            if !self.mask_shares.contains_key(&owner) {
                let Some(selected) =
                    acs.get(&self.mask_acs_session(owner)).and_then(Acs::output).map(<[PartyId]>::to_vec)
                else {
                    continue;
                };
                let mut mask = ModularNumber::ZERO;
                let mut complete = true;
                for dealer in selected {
                    match store.css_result(&self.mask_css_session(owner, dealer)) {
                        Some(output) => mask = mask + &output.share,
                        None => {
                            complete = false;
                            break;
                        }
                    }
                }
                if complete {
                    self.mask_shares.insert(owner, mask);
                    store.bump();
                }
            }
            if let Some(mask) = self.mask_shares.get(&owner).copied() {
                if !self.opened_outputs.contains(&owner) {
                    self.opened_outputs.insert(owner);
                    let masked = outputs[&owner] + mask;
                    store
                        .reveal_input(self.output_open_session(owner), RevealMode::Public, masked)
                        .context("opening masked output")?;
                    store
                        .reveal_input(
                            self.output_unmask_session(owner),
                            RevealMode::ToParty(owner),
                            mask,
                        )
                        .context("unmasking to owner")?;
                    store.bump();
                }
            }
        }
        if self.result.is_none() {
            let opened = store.reveal_result(&self.output_open_session(local));
            let mask = store.reveal_result(&self.output_unmask_session(local));
            if let (Some(opened), Some(mask)) = (opened, mask) {
                self.result = Some(opened - mask);
                store.bump();
            }
        }
        Ok(())
    }

    fn gate_result(&self, left: PartyId, right: PartyId) -> anyhow::Result<ModularNumber> {
        self.gates
            .get(&(left, right))
            .and_then(GtGate::result)
            .ok_or_else(|| anyhow!("comparison gate {left}/{right} incomplete"))
    }
}
