// perch_core/src/control/mod.rs

pub mod approach;

pub use approach::{ApproachCommand, ApproachController};
