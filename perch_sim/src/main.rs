// perch_sim/src/main.rs

//! The `perch` binary: loads a scenario, flies it, and reports the outcome.
//!
//! `cargo run --bin perch -- --scenario assets/scenarios/default_mission.toml`

use clap::Parser;
use tracing::{info, warn};

use perch_sim::cli::{init_tracing, Cli};
use perch_sim::error::SimError;
use perch_sim::simulation::config::load_scenario;
use perch_sim::SimulationRunner;

fn main() -> Result<(), SimError> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    // --- 1. Load Scenario Configuration ---
    let mut config = load_scenario(&cli.scenario)?;
    cli.apply_overrides(&mut config);

    if cli.dump_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    // --- 2. Build the World, Drone and Mission ---
    let mut runner = SimulationRunner::from_config(config)?;
    let (map_width, map_height) = runner.environment().dimensions();
    info!(
        "Map {}x{}, landmark at {:?}",
        map_width,
        map_height,
        runner.environment().landmark().map(|l| l.position)
    );

    // --- 3. Run the Mission ---
    let summary = runner.run()?;

    // --- 4. Report ---
    info!("{}", summary);
    info!(
        "Visual odometry: {} samples buffered, cumulative ({:.1}, {:.1}) px",
        summary.odometry_samples, summary.cumulative_odometry.x, summary.cumulative_odometry.y
    );
    if let Some(status) = &summary.last_status {
        info!("Final status: {}", status);
    }
    if !summary.completed {
        warn!("Landing was not completed");
    }
    Ok(())
}
