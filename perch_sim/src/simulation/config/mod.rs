// perch_sim/src/simulation/config/mod.rs

//! This module handles loading and validating the scenario configuration from
//! disk, layered with `PERCH_`-prefixed environment overrides.

pub mod structs;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;
use tracing::{info, warn};

use crate::error::SimError;

// Re-export public types
pub use structs::{DroneConfig, MissionConfig, ScenarioConfig, SimulationSection, WorldConfig};

/// Environment variables with this prefix override scenario values; nested
/// keys are separated by `__`, e.g. `PERCH_SIMULATION__MAX_TICKS=200`.
pub const ENV_PREFIX: &str = "PERCH_";

/// Loads a scenario: built-in defaults, then the TOML file, then the environment.
///
/// A missing file is not an error; the defaults fly the demo route.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, SimError> {
    let mut figment = Figment::new();
    if path.exists() {
        info!("Loading scenario from: {:?}", path);
        figment = figment.merge(Toml::file(path));
    } else {
        warn!(
            "Scenario file not found at {:?}, using built-in defaults.",
            path
        );
    }

    let config: ScenarioConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

/// Parses a scenario from TOML text, without environment overrides.
pub fn parse_scenario(toml: &str) -> Result<ScenarioConfig, SimError> {
    let config: ScenarioConfig = Figment::new().merge(Toml::string(toml)).extract()?;
    config.validate()?;
    Ok(config)
}
