// perch_sim/src/simulation/world/mod.rs

pub mod environment;
pub mod procedural;
