// perch_core/src/navigation/mod.rs

pub mod waypoint;

pub use waypoint::{WaypointNavigator, WaypointProgress, WaypointStep};
