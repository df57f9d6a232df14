// perch_core/src/mission/status.rs

use crate::navigation::WaypointProgress;
use crate::perception::{Detection, OdometryResult};
use crate::types::{Command, MissionMode, Position2D};
use nalgebra::Vector2;
use std::fmt;

/// Why cruise handed over to landing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Escalation {
    /// The route's last waypoint was reached.
    RouteComplete,
    /// The drone came within the map-space proximity radius of the landmark.
    MapProximity { distance: f64 },
    /// The camera locked onto the landmark close to the image centre.
    VisionLock { confidence: f64, distance: f64 },
}

/// How the landing phase steered this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LandingGuidance {
    /// Camera-space centring on a confident detection.
    Vision { error: Vector2<f64>, distance: f64 },
    /// Landmark lost but close on the map: centring by map coordinates.
    MapFinalApproach { error: Vector2<f64>, distance: f64 },
    /// Landmark lost and far: slow single-axis moves toward its map position.
    Search { distance: f64 },
    /// Landmark lost far from the landmark with route left to fly: back to cruise.
    ReturnToRoute { distance: f64 },
}

/// Everything the driver needs to report one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionStatus {
    pub tick: u64,
    /// Mode after this tick's transitions.
    pub mode: MissionMode,
    /// Command issued this tick.
    pub command: Command,
    /// Waypoint being steered toward in cruise.
    pub target: Option<Position2D>,
    /// Landmark detection run this tick, if any.
    pub detection: Option<Detection>,
    /// Odometry computed this tick, if any.
    pub odometry: Option<OdometryResult>,
    pub progress: WaypointProgress,
    pub guidance: Option<LandingGuidance>,
    /// Set on the tick cruise switched to landing.
    pub escalation: Option<Escalation>,
    /// Map distance to the landmark; infinite when none is known.
    pub landmark_distance: f64,
    /// Set on the tick the landing finished.
    pub landed: bool,
}

impl MissionStatus {
    pub fn is_completed(&self) -> bool {
        self.mode == MissionMode::Completed
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} | waypoint {}/{}",
            self.mode, self.command, self.progress.index, self.progress.total
        )?;
        match self.guidance {
            Some(LandingGuidance::Vision { error, distance }) => write!(
                f,
                " | error ({:.1}, {:.1}) dist {distance:.1}",
                error.x, error.y
            )?,
            Some(LandingGuidance::MapFinalApproach { distance, .. }) => {
                write!(f, " | final approach, map dist {distance:.1}")?
            }
            Some(LandingGuidance::Search { distance }) => {
                write!(f, " | searching, map dist {distance:.1}")?
            }
            Some(LandingGuidance::ReturnToRoute { distance }) => {
                write!(f, " | landmark lost at {distance:.1}, resuming route")?
            }
            None => {}
        }
        if let Some(target) = self.target {
            write!(f, " | target ({:.0}, {:.0})", target.x, target.y)?;
        }
        Ok(())
    }
}
