// perch_sim/src/prelude.rs

// Re-export the entire perch_core prelude so you can easily access
// pure types like `Command`, `MissionStatus`, `LandmarkDetector`, etc.
pub use perch_core::prelude::*;

// Re-export common simulation-specific types for easy access.
pub use crate::error::SimError;
pub use crate::simulation::config::structs::*;
pub use crate::simulation::config::{load_scenario, parse_scenario};
pub use crate::simulation::core::prng::SimulationRng;
pub use crate::simulation::core::runner::{build_world, RunSummary, SimulationRunner, StepOutcome};
pub use crate::simulation::vehicles::drone::{BatteryStatus, DroneModel, DroneParams, DroneStatus};
pub use crate::simulation::world::environment::{Environment, PlacedLandmark, ViewRect};
pub use crate::simulation::world::procedural::{generate_landmark, generate_map};
