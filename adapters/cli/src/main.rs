#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives a Tilehop level headlessly.

mod level;
mod session;

use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use glam::Vec3;
use tilehop_core::{Command, GridKey, SizeState, TeleporterId};
use tilehop_world::query;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    level::Level,
    session::{Outcome, Session},
};

const DEFAULT_LOG_FILTER: &str = "info";

/// Replays moves on a Tilehop level and reports where the agent ends up.
#[derive(Debug, Parser)]
#[command(name = "tilehop", version)]
struct Args {
    /// Level file in TOML format.
    level: PathBuf,
    /// Cell to travel to, as `x,z` in world units. Repeat to queue moves.
    #[arg(long = "move", value_name = "X,Z", value_parser = parse_target)]
    moves: Vec<GridKey>,
    /// Mutation to adopt before the first move.
    #[arg(long, value_enum)]
    mutate: Option<Mutation>,
    /// Teleporter to activate after the moves. May be repeated.
    #[arg(long = "teleport", value_name = "ID")]
    teleports: Vec<u32>,
    /// Pick up the torch after the moves.
    #[arg(long)]
    torch: bool,
    /// Fixed-step frequency in hertz.
    #[arg(long, default_value_t = 50)]
    hz: u32,
    /// Seconds a single move may take before it is abandoned.
    #[arg(long, default_value_t = 30.0)]
    timeout: f32,
    /// Seconds to keep simulating after the last action.
    #[arg(long, default_value_t = 1.0)]
    settle: f32,
    /// Tracing filter directive. Takes precedence over `RUST_LOG`.
    #[arg(long)]
    log_filter: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mutation {
    Small,
    Normal,
    Big,
}

impl From<Mutation> for SizeState {
    fn from(mutation: Mutation) -> Self {
        match mutation {
            Mutation::Small => SizeState::Small,
            Mutation::Normal => SizeState::Normal,
            Mutation::Big => SizeState::Big,
        }
    }
}

/// Entry point for the Tilehop command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_filter.as_deref())?;

    let level = Level::load(&args.level)?;
    let transition = level.config.scale.transition();
    let frame = frame_duration(args.hz)?;
    let timeout = seconds("timeout", args.timeout)?;
    let settle = seconds("settle", args.settle)?;

    let mut session = Session::new(level, frame);

    if let Some(mutation) = args.mutate {
        let _ = session.submit(Command::SetMutation {
            size: mutation.into(),
        });
        session.run_for(transition);
    }

    for target in &args.moves {
        match session.travel(*target, timeout) {
            Outcome::Settled(cell) => match cell {
                Some(cell) if cell == *target => info!(%target, "arrived"),
                Some(cell) => info!(%target, resting = %cell, "came to rest elsewhere"),
                None => warn!(%target, "agent is off the grid"),
            },
            Outcome::Rejected(reason) => warn!(%target, %reason, "move refused"),
            Outcome::TimedOut => warn!(%target, "move did not finish in time"),
        }
    }

    for id in &args.teleports {
        let _ = session.submit(Command::ActivateTeleporter {
            teleporter: TeleporterId::new(*id),
        });
    }
    if args.torch {
        let _ = session.submit(Command::PickUpTorch);
    }
    session.run_for(settle);

    let agent = query::agent(session.world());
    match agent.cell {
        Some(cell) => println!("cell: {cell}"),
        None => println!("cell: none"),
    }
    println!(
        "position: ({:.3}, {:.3}, {:.3})",
        agent.position.x, agent.position.y, agent.position.z
    );
    println!("scale: {:.3} ({:?})", agent.scale, agent.size);
    println!("sticky: {}", agent.sticky);
    println!("torch: {}", agent.has_torch);

    Ok(())
}

fn init_tracing(directive: Option<&str>) -> Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter `{directive}`"))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn frame_duration(hz: u32) -> Result<Duration> {
    if hz == 0 {
        bail!("--hz must be greater than zero");
    }
    Ok(Duration::from_secs(1) / hz)
}

fn seconds(name: &str, value: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(value)
        .with_context(|| format!("--{name} must be a non-negative number of seconds"))
}

fn parse_target(value: &str) -> Result<GridKey, String> {
    let (x, z) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `x,z`, got `{value}`"))?;
    let x: f32 = x
        .trim()
        .parse()
        .map_err(|error| format!("invalid x coordinate `{x}`: {error}"))?;
    let z: f32 = z
        .trim()
        .parse()
        .map_err(|error| format!("invalid z coordinate `{z}`: {error}"))?;
    Ok(GridKey::from_position(Vec3::new(x, 0.0, z)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_parse_as_quantized_keys() {
        assert_eq!(parse_target("1.5, -2"), Ok(GridKey::new(1500, -2000)));
        assert!(parse_target("1.5").is_err());
        assert!(parse_target("a,2").is_err());
    }

    #[test]
    fn zero_frequency_is_rejected() {
        assert!(frame_duration(0).is_err());
        assert_eq!(frame_duration(50).ok(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn arguments_parse_repeated_moves() {
        let args = Args::try_parse_from([
            "tilehop",
            "level.toml",
            "--move",
            "1,0",
            "--move",
            "2,1",
            "--mutate",
            "small",
            "--teleport",
            "3",
        ])
        .expect("arguments parse");

        assert_eq!(args.moves, vec![GridKey::new(1000, 0), GridKey::new(2000, 1000)]);
        assert!(matches!(args.mutate, Some(Mutation::Small)));
        assert_eq!(args.teleports, vec![3]);
        assert_eq!(args.hz, 50);
    }
}
