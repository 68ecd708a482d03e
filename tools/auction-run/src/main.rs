//! Runs one sealed second-price auction over the simulated network.

use anyhow::{anyhow, bail, Context, Result};
use basic_types::PartyId;
use clap::Parser;
use protocols::{
    envelope::MessageKind,
    simulator::{AuctionSimulator, DelayModel, OmissionPolicy, SimulationError, SimulatorOptions},
};
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[clap(name = "auction-run", about = "Asynchronous MPC sealed second-price auction demo")]
struct Options {
    /// Comma separated bids for parties 1..4, each in [0, 32), all distinct.
    #[clap(long, default_value = "5,20,13,7")]
    bids: String,

    /// Seed for a deterministic run.
    #[clap(long, default_value_t = 0)]
    seed: u64,

    /// Party made faulty by the omission policy.
    #[clap(long)]
    omit: Option<u8>,

    /// Omission policy: drop-all, drop-prob:<p>, drop-types:<kind,...>,
    /// burst:<start-end,...> (virtual microseconds).
    #[clap(long, default_value = "drop-all")]
    policy: String,

    /// Delay model: fixed:<us>, uniform:<lo>-<hi>, exp:<mean>,
    /// adversarial:<party>=<extra-us>.
    #[clap(long, default_value = "uniform:500-15000")]
    delay: String,

    /// Delivery budget before the run aborts.
    #[clap(long, default_value_t = 2_000_000)]
    max_events: u64,
}

fn parse_bids(input: &str) -> Result<BTreeMap<PartyId, u64>> {
    let values: Vec<u64> = input
        .split(',')
        .map(|bid| bid.trim().parse::<u64>().context("bids must be integers"))
        .collect::<Result<_>>()?;
    if values.len() != 4 {
        bail!("expected exactly 4 bids, found {}", values.len());
    }
    if values.iter().any(|bid| *bid >= 32) {
        bail!("bids must be in [0, 32)");
    }
    let mut sorted = values.clone();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != values.len() {
        bail!("bids must be distinct");
    }
    Ok(PartyId::all(4).into_iter().zip(values).collect())
}

fn parse_message_kind(name: &str) -> Result<MessageKind> {
    MessageKind::all()
        .into_iter()
        .find(|kind| kind.to_string().eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow!("unknown message type {name}"))
}

fn parse_policy(input: &str, party: PartyId) -> Result<OmissionPolicy> {
    let (name, argument) = match input.split_once(':') {
        Some((name, argument)) => (name, Some(argument)),
        None => (input, None),
    };
    match (name, argument) {
        ("drop-all", None) => Ok(OmissionPolicy::DropAll { party }),
        ("drop-prob", Some(probability)) => Ok(OmissionPolicy::DropProb {
            party,
            probability: probability.parse().context("drop probability")?,
        }),
        ("drop-types", Some(kinds)) => Ok(OmissionPolicy::DropTypes {
            party,
            kinds: kinds.split(',').map(parse_message_kind).collect::<Result<_>>()?,
        }),
        ("burst", Some(intervals)) => {
            let intervals = intervals
                .split(',')
                .map(|interval| {
                    let (start, end) = interval
                        .split_once('-')
                        .ok_or_else(|| anyhow!("burst intervals look like start-end"))?;
                    Ok((start.parse()?, end.parse()?))
                })
                .collect::<Result<_>>()?;
            Ok(OmissionPolicy::BurstDrop { party, intervals })
        }
        _ => bail!("unknown omission policy {input}"),
    }
}

fn parse_delay(input: &str) -> Result<DelayModel> {
    let (name, argument) =
        input.split_once(':').ok_or_else(|| anyhow!("delay models look like name:args"))?;
    match name {
        "fixed" => Ok(DelayModel::Fixed { micros: argument.parse().context("fixed delay")? }),
        "uniform" => {
            let (low, high) = argument
                .split_once('-')
                .ok_or_else(|| anyhow!("uniform delays look like uniform:lo-hi"))?;
            Ok(DelayModel::Uniform {
                low_micros: low.parse().context("uniform low")?,
                high_micros: high.parse().context("uniform high")?,
            })
        }
        "exp" => {
            Ok(DelayModel::Exponential { mean_micros: argument.parse().context("exp mean")? })
        }
        "adversarial" => {
            let mut per_sender_micros = BTreeMap::new();
            for entry in argument.split(',') {
                let (party, extra) = entry
                    .split_once('=')
                    .ok_or_else(|| anyhow!("adversarial entries look like party=extra-us"))?;
                per_sender_micros
                    .insert(PartyId::new(party.parse().context("party index")?), extra.parse()?);
            }
            Ok(DelayModel::Adversarial { jitter_micros: 2_000, per_sender_micros })
        }
        _ => bail!("unknown delay model {input}"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let options = Options::parse();

    let bids = parse_bids(&options.bids)?;
    let omission = options
        .omit
        .map(|index| {
            if !(1..=4).contains(&index) {
                bail!("omitting party must be 1..4");
            }
            parse_policy(&options.policy, PartyId::new(index))
        })
        .transpose()?;
    let delay = parse_delay(&options.delay)?;

    println!("bids: {bids:?}");
    if let Some(policy) = &omission {
        println!("fault: {policy:?}");
    }

    let simulator_options =
        SimulatorOptions { seed: options.seed, delay, omission, max_events: options.max_events };
    let mut simulator =
        AuctionSimulator::new(&bids, simulator_options).context("building the network")?;
    match simulator.run() {
        Ok(outcome) => {
            println!("active set: {:?}", outcome.active_set);
            for (party, output) in &outcome.outputs {
                let role = if *output > 0 { " (winner; value is the second price)" } else { "" };
                println!("{party}: {output}{role}");
            }
            println!("--- metrics ---");
            println!("{}", outcome.metrics);
            Ok(())
        }
        Err(error @ SimulationError::BudgetExhausted { .. }) => {
            Err(anyhow!(error)).context("run did not complete within budget")
        }
        Err(error) => Err(anyhow!(error)).context("run failed"),
    }
}
