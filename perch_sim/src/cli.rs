// perch_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::simulation::config::ScenarioConfig;

/// Perch: a drone waypoint-navigation and vision-guided landing simulator.
///
/// This struct defines the command-line arguments accepted by the `perch` binary.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(
        short,
        long,
        default_value = "assets/scenarios/default_mission.toml"
    )]
    pub scenario: PathBuf,

    /// Stop after this many ticks, overriding `simulation.max_ticks`.
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Seed for procedural maps, overriding `simulation.seed`.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log filter, e.g. `info` or `perch_core=trace`. `RUST_LOG` wins when set.
    #[arg(long, default_value = "info,perch_sim=debug,perch_core=info")]
    pub log_level: String,

    /// Print the fully resolved scenario as TOML and exit.
    #[arg(long, default_value_t = false)]
    pub dump_config: bool,
}

impl Cli {
    /// Folds command-line overrides into a loaded scenario.
    pub fn apply_overrides(&self, config: &mut ScenarioConfig) {
        if let Some(max_ticks) = self.max_ticks {
            config.simulation.max_ticks = max_ticks;
        }
        if let Some(seed) = self.seed {
            config.simulation.seed = Some(seed);
        }
    }
}

/// Installs the global `tracing` subscriber. Safe to call more than once.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_scenario_values() {
        let cli = Cli::parse_from(["perch", "--max-ticks", "42", "--seed", "7"]);
        let mut config = ScenarioConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.simulation.max_ticks, 42);
        assert_eq!(config.simulation.seed, Some(7));
    }

    #[test]
    fn defaults_leave_scenario_untouched() {
        let cli = Cli::parse_from(["perch"]);
        let mut config = ScenarioConfig::default();
        let before = config.simulation.max_ticks;
        cli.apply_overrides(&mut config);
        assert_eq!(config.simulation.max_ticks, before);
        assert_eq!(
            cli.scenario,
            PathBuf::from("assets/scenarios/default_mission.toml")
        );
    }
}
