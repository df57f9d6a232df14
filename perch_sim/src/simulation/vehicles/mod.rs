// perch_sim/src/simulation/vehicles/mod.rs

pub mod drone;
