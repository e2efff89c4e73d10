#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Outpost session between
//! computer-controlled civilizations.

mod scenario;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use outpost_core::WorldQuery;
use outpost_system_ai::{Ai, DEFAULT_MAX_EXPLORERS};
use outpost_world::{query, AStarPathfinder};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::scenario::{Scenario, DEFAULT_SCENARIO};

/// Runs computer players against each other on a scenario map.
#[derive(Debug, Parser)]
#[command(name = "outpost", about = "Headless Outpost session", version)]
struct Cli {
    /// Scenario file to play; the bundled scenario is used when omitted.
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Number of rounds to play.
    #[arg(short, long, default_value_t = 50)]
    rounds: u32,

    /// Explorers each computer player keeps in the field.
    #[arg(long, default_value_t = DEFAULT_MAX_EXPLORERS)]
    max_explorers: usize,

    /// Enables debug logging of objectives and the world.
    #[arg(short, long)]
    verbose: bool,
}

/// Entry point for the Outpost command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    fmt().with_env_filter(filter).with_target(false).init();

    let scenario = match &cli.scenario {
        Some(path) => Scenario::load(path)?,
        None => Scenario::parse(DEFAULT_SCENARIO)?,
    };
    let mut world = scenario.build()?;
    info!(
        civilizations = ?scenario.civilization_names().collect::<Vec<_>>(),
        "scenario loaded"
    );

    let pathfinder = AStarPathfinder::new();
    let mut players: Vec<Ai> = query::civilizations(&world)
        .into_iter()
        .map(|civ| Ai::with_default_objectives(civ, cli.max_explorers))
        .collect();

    for _ in 0..cli.rounds {
        for player in &mut players {
            let report = player.play_turn(&mut world, &pathfinder);
            let _ = world.drain_messages(player.civ());
            debug!(
                civ = player.civ().get(),
                adopted = report.adopted,
                freed = report.freed,
                production_changes = report.production_changes,
                "turn played"
            );
        }
        info!(round = query::round(&world), "round complete");
    }

    for player in &players {
        let civ = player.civ();
        info!(
            civilization = query::civilization_name(&world, civ).unwrap_or("unknown"),
            cities = world.cities(civ).len(),
            units = world.units(civ).len(),
            explored_tiles = query::known_tile_count(&world, civ),
            "final standing"
        );
    }
    Ok(())
}
