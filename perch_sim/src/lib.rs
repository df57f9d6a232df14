// perch_sim/src/lib.rs

//! The simulation driver for `perch_core`: a procedural world, a point-mass
//! drone and the tick loop that feeds camera frames to the mission.

// This prelude is for convenience for other files WITHIN the perch_sim crate.
pub mod prelude;

pub mod cli;
pub mod error;
pub mod simulation;

pub use error::SimError;
pub use simulation::core::runner::{RunSummary, SimulationRunner, StepOutcome};
