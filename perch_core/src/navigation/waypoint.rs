// perch_core/src/navigation/waypoint.rs

use crate::error::{PerchError, Result};
use crate::types::{distance, Command, Position2D};
use serde::{Deserialize, Serialize};
use tracing::info;

/// The command for this tick and the waypoint it steers toward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaypointStep {
    pub command: Command,
    /// `None` once the route is finished.
    pub target: Option<Position2D>,
}

/// Route progress as `index / total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaypointProgress {
    pub index: usize,
    pub total: usize,
}

/// Follows an ordered, fixed list of map positions.
///
/// The list cannot be edited in flight; a new route needs a new navigator.
#[derive(Debug, Clone)]
pub struct WaypointNavigator {
    waypoints: Vec<Position2D>,
    /// Reached when strictly closer than this, in map pixels.
    radius: f64,
    current: usize,
    reached: bool,
}

impl WaypointNavigator {
    pub fn new(waypoints: Vec<Position2D>, radius: f64) -> Result<Self> {
        if waypoints.len() < 2 {
            return Err(PerchError::Configuration(format!(
                "a route needs at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(PerchError::Configuration(format!(
                "waypoint radius must be positive, got {radius}"
            )));
        }
        info!("Navigator initialized with {} waypoints", waypoints.len());
        Ok(Self {
            waypoints,
            radius,
            current: 0,
            reached: false,
        })
    }

    /// Decides the movement for this tick.
    ///
    /// Reaching a waypoint advances the index in the same call, and the command
    /// then steers toward the next one. Reaching the last waypoint returns
    /// `ReachedDestination` once; every later call returns `Hold`.
    pub fn advance(&mut self, position: &Position2D) -> WaypointStep {
        if self.reached {
            return WaypointStep {
                command: Command::Hold,
                target: None,
            };
        }

        let mut target = self.waypoints[self.current];
        if distance(position, &target) < self.radius {
            self.current += 1;
            if self.current >= self.waypoints.len() {
                self.reached = true;
                info!("Reached final waypoint");
                return WaypointStep {
                    command: Command::ReachedDestination,
                    target: None,
                };
            }
            target = self.waypoints[self.current];
            info!(
                "Reached waypoint {}, moving to ({:.0}, {:.0})",
                self.current, target.x, target.y
            );
        }

        let delta = target - position;
        WaypointStep {
            command: Command::toward(delta.x, delta.y),
            target: Some(target),
        }
    }

    /// Back to the first waypoint. The route itself is untouched.
    pub fn reset(&mut self) {
        self.current = 0;
        self.reached = false;
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn is_destination_reached(&self) -> bool {
        self.reached
    }

    pub fn progress(&self) -> WaypointProgress {
        WaypointProgress {
            index: self.current,
            total: self.waypoints.len(),
        }
    }

    pub fn waypoints(&self) -> &[Position2D] {
        &self.waypoints
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}
