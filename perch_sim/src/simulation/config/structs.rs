// perch_sim/src/simulation/config/structs.rs

use perch_core::config::{DetectorConfig, MissionThresholds, OdometryConfig};
use perch_core::error::{PerchError, Result};
use perch_core::types::Position2D;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::simulation::vehicles::drone::DroneParams;

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # ScenarioConfig
/// The root of the data parsed from a `scenario.toml` file.
/// Every section is optional; missing values fall back to the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct ScenarioConfig {
    pub simulation: SimulationSection,
    pub world: WorldConfig,
    pub drone: DroneConfig,
    pub mission: MissionConfig,
    pub detector: DetectorConfig,
    pub odometry: OdometryConfig,
}

impl ScenarioConfig {
    /// Checks every section; the first problem is reported as a configuration error.
    pub fn validate(&self) -> Result<()> {
        if self.simulation.camera_width == 0 || self.simulation.camera_height == 0 {
            return Err(PerchError::Configuration(
                "simulation.camera_width and camera_height must be non-zero".to_string(),
            ));
        }
        if self.world.map_image.is_none() && (self.world.map_width == 0 || self.world.map_height == 0)
        {
            return Err(PerchError::Configuration(
                "world.map_width and map_height must be non-zero".to_string(),
            ));
        }
        if self.mission.waypoints.len() < 2 {
            return Err(PerchError::Configuration(format!(
                "mission.waypoints needs at least 2 entries, got {}",
                self.mission.waypoints.len()
            )));
        }
        self.mission.thresholds.validate()?;
        let (physics, mission) = (
            self.drone.physics.landing_altitude,
            self.mission.thresholds.landing_altitude,
        );
        if (physics - mission).abs() > 1e-9 {
            return Err(PerchError::Configuration(format!(
                "drone.physics.landing_altitude ({}) must equal mission.thresholds.landing_altitude ({})",
                physics, mission
            )));
        }
        self.detector.validate()?;
        self.odometry.validate()
    }

    pub fn camera_size(&self) -> (u32, u32) {
        (self.simulation.camera_width, self.simulation.camera_height)
    }
}

// =========================================================================
// == Configuration Sub-Structs ==
// These map directly to the sections in the scenario.toml file.
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// The run stops after this many ticks even if the mission is not complete.
    pub max_ticks: u64,
    pub camera_width: u32,
    pub camera_height: u32,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            seed: Some(42),
            max_ticks: 5000,
            camera_width: 640,
            camera_height: 480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldConfig {
    /// Map image on disk. When absent a map is generated from the seed.
    pub map_image: Option<PathBuf>,
    /// Size of the generated map.
    pub map_width: u32,
    pub map_height: u32,
    /// Landmark image on disk. When absent a marker is generated from the seed.
    pub landmark_image: Option<PathBuf>,
    /// Resolution of the generated marker, which doubles as the detector reference.
    pub landmark_resolution: u32,
    /// Landmark centre in map pixels. When absent it goes to the map centre.
    pub landmark_position: Option<[f64; 2]>,
    /// Landmark footprint on the map, in pixels.
    pub landmark_size: [u32; 2],
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            map_image: None,
            map_width: 1600,
            map_height: 1200,
            landmark_image: None,
            landmark_resolution: 160,
            landmark_position: Some([500.0, 400.0]),
            landmark_size: [160, 160],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DroneConfig {
    /// Start position in map pixels. When absent the drone starts on the first waypoint.
    pub start_position: Option<[f64; 2]>,
    pub start_altitude: f64,
    pub physics: DroneParams,
}

impl Default for DroneConfig {
    fn default() -> Self {
        Self {
            start_position: None,
            start_altitude: 150.0,
            physics: DroneParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MissionConfig {
    /// Ordered route in map pixels.
    pub waypoints: Vec<[f64; 2]>,
    pub thresholds: MissionThresholds,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            waypoints: vec![
                [100.0, 100.0],
                [300.0, 100.0],
                [300.0, 300.0],
                [500.0, 300.0],
                [500.0, 380.0],
                [500.0, 400.0],
            ],
            thresholds: MissionThresholds::default(),
        }
    }
}

impl MissionConfig {
    pub fn route(&self) -> Vec<Position2D> {
        self.waypoints
            .iter()
            .map(|&[x, y]| Position2D::new(x, y))
            .collect()
    }
}
