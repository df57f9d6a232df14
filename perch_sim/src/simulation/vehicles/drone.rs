// perch_sim/src/simulation/vehicles/drone.rs

use perch_core::abstractions::MotionExecutor;
use perch_core::types::{Command, Position2D};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

// =========================================================================
// == Drone Parameters ==
// =========================================================================

/// Physical limits of the simulated drone. Distances are map pixels per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DroneParams {
    /// Initial cruise speed.
    pub velocity: f64,
    pub min_velocity: f64,
    pub max_velocity: f64,
    pub descent_rate: f64,
    pub ascent_rate: f64,
    pub min_altitude: f64,
    pub max_altitude: f64,
    /// At or below this altitude a descent counts as landing.
    pub landing_altitude: f64,
    /// Battery percentage drained by every command.
    pub battery_drain: f64,
}

impl Default for DroneParams {
    fn default() -> Self {
        Self {
            velocity: 2.0,
            min_velocity: 0.5,
            max_velocity: 5.0,
            descent_rate: 1.5,
            ascent_rate: 2.0,
            min_altitude: 5.0,
            max_altitude: 150.0,
            landing_altitude: 10.0,
            battery_drain: 0.005,
        }
    }
}

// =========================================================================
// == Status Records ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    Ok,
    Low,
    Critical,
    Emergency,
}

impl BatteryStatus {
    pub fn from_level(level: f64) -> Self {
        if level > 50.0 {
            BatteryStatus::Ok
        } else if level > 20.0 {
            BatteryStatus::Low
        } else if level > 5.0 {
            BatteryStatus::Critical
        } else {
            BatteryStatus::Emergency
        }
    }
}

impl fmt::Display for BatteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatteryStatus::Ok => "OK",
            BatteryStatus::Low => "LOW",
            BatteryStatus::Critical => "CRITICAL",
            BatteryStatus::Emergency => "EMERGENCY",
        };
        f.write_str(label)
    }
}

/// Snapshot of the drone for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct DroneStatus {
    pub position: Position2D,
    pub altitude: f64,
    /// Degrees; 0 faces +X, 90 faces "forward" (-Y in the image).
    pub heading: f64,
    pub velocity: f64,
    pub battery: f64,
    pub battery_status: BatteryStatus,
    pub is_landing: bool,
    pub is_landed: bool,
    pub last_command: Command,
}

// =========================================================================
// == Drone Model ==
// =========================================================================

/// Kinematic drone: single-axis moves at an altitude-adaptive speed.
#[derive(Debug, Clone)]
pub struct DroneModel {
    params: DroneParams,
    position: Position2D,
    altitude: f64,
    velocity: f64,
    heading: f64,
    battery: f64,
    is_landing: bool,
    is_landed: bool,
    last_command: Command,
}

impl DroneModel {
    pub fn new(params: DroneParams, position: Position2D, altitude: f64) -> Self {
        let altitude = altitude.clamp(params.min_altitude, params.max_altitude);
        info!(
            "Drone initialized at ({:.1}, {:.1}), altitude {:.1}",
            position.x, position.y, altitude
        );
        Self {
            velocity: params.velocity,
            params,
            position,
            altitude,
            heading: 0.0,
            battery: 100.0,
            is_landing: false,
            is_landed: false,
            last_command: Command::Hold,
        }
    }

    /// Applies one command: moves at the current speed, drains the battery,
    /// then adapts the speed to the new altitude.
    pub fn apply(&mut self, command: Command) {
        let step = self.velocity;
        match command {
            Command::MoveForward => {
                self.position.y -= step;
                self.heading = 90.0;
            }
            Command::MoveBackward => {
                self.position.y += step;
                self.heading = 270.0;
            }
            Command::MoveLeft => {
                self.position.x -= step;
                self.heading = 180.0;
            }
            Command::MoveRight => {
                self.position.x += step;
                self.heading = 0.0;
            }
            Command::Descend => {
                if !self.is_landed {
                    self.altitude =
                        (self.altitude - self.params.descent_rate).max(self.params.min_altitude);
                    if self.altitude <= self.params.landing_altitude {
                        self.is_landing = true;
                    }
                }
            }
            Command::Ascend => {
                self.altitude =
                    (self.altitude + self.params.ascent_rate).min(self.params.max_altitude);
                self.is_landing = false;
            }
            Command::Hold | Command::ReachedDestination => {}
        }

        let before = BatteryStatus::from_level(self.battery);
        self.battery = (self.battery - self.params.battery_drain).max(0.0);
        let after = BatteryStatus::from_level(self.battery);
        if after != before {
            warn!("Battery {:.1}% ({})", self.battery, after);
        }

        self.update_velocity();
        self.last_command = command;

        if self.is_landing && !self.is_landed && self.altitude <= self.params.min_altitude {
            self.is_landed = true;
            info!("Drone has landed");
        }
    }

    /// Slow down when low for precise landing, speed up when high.
    fn update_velocity(&mut self) {
        let scaled = if self.altitude < 30.0 {
            self.velocity * 0.95
        } else if self.altitude < 80.0 {
            self.velocity * 1.02
        } else {
            self.velocity * 1.01
        };
        self.velocity = scaled.clamp(self.params.min_velocity, self.params.max_velocity);
    }

    pub fn set_velocity(&mut self, velocity: f64) {
        self.velocity = velocity.clamp(self.params.min_velocity, self.params.max_velocity);
    }

    pub fn emergency_land(&mut self) {
        warn!("Emergency landing initiated");
        self.is_landing = true;
        self.velocity = self.params.min_velocity;
    }

    /// Moves the drone back to a start pose; battery and speed are kept.
    pub fn reset(&mut self, position: Position2D, altitude: f64) {
        self.position = position;
        self.altitude = altitude.clamp(self.params.min_altitude, self.params.max_altitude);
        self.is_landing = false;
        self.is_landed = false;
        info!(
            "Drone reset to ({:.1}, {:.1}), altitude {:.1}",
            position.x, position.y, self.altitude
        );
    }

    pub fn params(&self) -> &DroneParams {
        &self.params
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn battery(&self) -> f64 {
        self.battery
    }

    pub fn battery_status(&self) -> BatteryStatus {
        BatteryStatus::from_level(self.battery)
    }

    pub fn is_landing(&self) -> bool {
        self.is_landing
    }

    pub fn is_landed(&self) -> bool {
        self.is_landed
    }

    pub fn status(&self) -> DroneStatus {
        DroneStatus {
            position: self.position,
            altitude: self.altitude,
            heading: self.heading,
            velocity: self.velocity,
            battery: self.battery,
            battery_status: self.battery_status(),
            is_landing: self.is_landing,
            is_landed: self.is_landed,
            last_command: self.last_command,
        }
    }
}

impl MotionExecutor for DroneModel {
    fn execute(&mut self, command: Command) {
        self.apply(command);
    }

    fn position(&self) -> Position2D {
        self.position
    }

    fn altitude(&self) -> f64 {
        self.altitude
    }

    fn reduce_to_min_speed(&mut self) {
        if self.velocity > self.params.min_velocity {
            self.velocity = self.params.min_velocity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn drone(altitude: f64) -> DroneModel {
        DroneModel::new(DroneParams::default(), Position2D::new(100.0, 100.0), altitude)
    }

    #[test]
    fn moves_along_image_axes() {
        let mut d = drone(100.0);
        d.apply(Command::MoveForward);
        assert_abs_diff_eq!(d.position().y, 98.0);
        assert_eq!(d.heading(), 90.0);

        d.apply(Command::MoveRight);
        // Speed grew by 1% after the first move at high altitude.
        assert_abs_diff_eq!(d.position().x, 102.02, epsilon = 1e-9);
        assert_eq!(d.heading(), 0.0);
    }

    #[test]
    fn speed_adapts_to_altitude() {
        let mut low = drone(20.0);
        low.apply(Command::Hold);
        assert_abs_diff_eq!(low.velocity(), 1.9, epsilon = 1e-12);

        let mut mid = drone(50.0);
        mid.apply(Command::Hold);
        assert_abs_diff_eq!(mid.velocity(), 2.04, epsilon = 1e-12);

        let mut high = drone(150.0);
        for _ in 0..500 {
            high.apply(Command::Hold);
        }
        assert_abs_diff_eq!(high.velocity(), 5.0);
    }

    #[test]
    fn descent_is_floored_and_marks_landing() {
        let mut d = drone(11.0);
        d.execute(Command::Descend);
        assert_abs_diff_eq!(d.altitude(), 9.5);
        assert!(d.is_landing());
        assert!(!d.is_landed());

        for _ in 0..5 {
            d.execute(Command::Descend);
        }
        assert_abs_diff_eq!(d.altitude(), 5.0);
        assert!(d.is_landed());
    }

    #[test]
    fn ascent_is_capped_and_cancels_landing() {
        let mut d = drone(149.0);
        d.is_landing = true;
        d.execute(Command::Ascend);
        assert_abs_diff_eq!(d.altitude(), 150.0);
        assert!(!d.is_landing());
    }

    #[test]
    fn battery_drains_per_command() {
        let mut d = drone(100.0);
        for _ in 0..200 {
            d.execute(Command::Hold);
        }
        assert_abs_diff_eq!(d.battery(), 99.0, epsilon = 1e-9);
        assert_eq!(d.battery_status(), BatteryStatus::Ok);
        assert_eq!(BatteryStatus::from_level(50.0), BatteryStatus::Low);
        assert_eq!(BatteryStatus::from_level(20.0), BatteryStatus::Critical);
        assert_eq!(BatteryStatus::from_level(5.0), BatteryStatus::Emergency);
    }

    #[test]
    fn min_speed_and_emergency_landing() {
        let mut d = drone(100.0);
        d.reduce_to_min_speed();
        assert_abs_diff_eq!(d.velocity(), 0.5);

        d.set_velocity(10.0);
        assert_abs_diff_eq!(d.velocity(), 5.0);
        d.emergency_land();
        assert!(d.is_landing());
        assert_abs_diff_eq!(d.velocity(), 0.5);
    }

    #[test]
    fn reset_restores_pose_and_flags() {
        let mut d = drone(11.0);
        d.execute(Command::Descend);
        d.execute(Command::MoveLeft);
        d.reset(Position2D::new(10.0, 20.0), 150.0);

        let status = d.status();
        assert_eq!(status.position, Position2D::new(10.0, 20.0));
        assert_abs_diff_eq!(status.altitude, 150.0);
        assert!(!status.is_landing);
        assert_eq!(status.last_command, Command::MoveLeft);
    }
}
