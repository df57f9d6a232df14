// perch_core/src/types.rs

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

// --- Core Type Aliases ---
/// A position in map pixel coordinates. Image convention: +X right, +Y down.
pub type Position2D = Point2<f64>;

/// Euclidean distance between two map positions.
pub fn distance(a: &Position2D, b: &Position2D) -> f64 {
    nalgebra::distance(a, b)
}

// --- Discrete Commands ---
/// The single discrete command issued per simulation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    MoveForward,
    MoveBackward,
    MoveLeft,
    MoveRight,
    Descend,
    Ascend,
    Hold,
    /// Emitted once by the waypoint navigator when the last waypoint is reached.
    ReachedDestination,
}

impl Command {
    /// Picks a single-axis move toward a pixel offset `(dx, dy)`.
    ///
    /// The horizontal axis wins only when strictly dominant. Because image Y grows
    /// downward, a negative `dy` maps to `MoveForward`.
    pub fn toward(dx: f64, dy: f64) -> Self {
        if dx.abs() > dy.abs() {
            Self::horizontal(dx)
        } else {
            Self::vertical(dy)
        }
    }

    pub fn horizontal(dx: f64) -> Self {
        if dx > 0.0 {
            Command::MoveRight
        } else {
            Command::MoveLeft
        }
    }

    pub fn vertical(dy: f64) -> Self {
        if dy < 0.0 {
            Command::MoveForward
        } else {
            Command::MoveBackward
        }
    }

    /// True for the four planar movement commands.
    pub fn is_movement(&self) -> bool {
        matches!(
            self,
            Command::MoveForward | Command::MoveBackward | Command::MoveLeft | Command::MoveRight
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Command::MoveForward => "MOVE FORWARD",
            Command::MoveBackward => "MOVE BACKWARD",
            Command::MoveLeft => "MOVE LEFT",
            Command::MoveRight => "MOVE RIGHT",
            Command::Descend => "DESCEND",
            Command::Ascend => "ASCEND",
            Command::Hold => "HOLD",
            Command::ReachedDestination => "REACHED_DESTINATION",
        };
        f.write_str(label)
    }
}

// --- Mission Phases ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MissionMode {
    /// Following the waypoint route.
    #[default]
    Cruise,
    /// Vision-guided (or map-guided fallback) precision landing.
    Landing,
    /// Terminal until an explicit reset.
    Completed,
}

impl fmt::Display for MissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionMode::Cruise => f.write_str("NAVIGATION"),
            MissionMode::Landing => f.write_str("LANDING"),
            MissionMode::Completed => f.write_str("COMPLETED"),
        }
    }
}
