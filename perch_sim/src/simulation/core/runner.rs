// perch_sim/src/simulation/core/runner.rs

use image::GrayImage;
use nalgebra::Vector2;
use perch_core::prelude::*;
use std::fmt;
use std::result::Result;
use tracing::{debug, error, info, warn};

use crate::error::SimError;
use crate::simulation::config::{ScenarioConfig, WorldConfig};
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::vehicles::drone::{DroneModel, DroneStatus};
use crate::simulation::world::environment::{load_gray, Environment};
use crate::simulation::world::procedural::{generate_landmark, generate_map};

/// Result of a single tick.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Running(MissionStatus),
    Completed(MissionStatus),
}

impl StepOutcome {
    pub fn status(&self) -> &MissionStatus {
        match self {
            StepOutcome::Running(status) | StepOutcome::Completed(status) => status,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed(_))
    }
}

/// End-of-run report.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ticks: u64,
    pub completed: bool,
    pub last_status: Option<MissionStatus>,
    pub drone: DroneStatus,
    pub odometry_samples: usize,
    /// Sum of the buffered odometry displacements, in camera pixels.
    pub cumulative_odometry: Vector2<f64>,
}

impl fmt::Display for RunSummary {
    /// `battery` is already a percentage.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ticks: {}, completed: {}, drone at ({:.1}, {:.1}) alt {:.1}, battery {:.1}% ({})",
            self.ticks,
            self.completed,
            self.drone.position.x,
            self.drone.position.y,
            self.drone.altitude,
            self.drone.battery,
            self.drone.battery_status
        )
    }
}

/// Builds the map and places the landmark; returns the landmark reference
/// image for the detector alongside the environment.
pub fn build_world(
    world: &WorldConfig,
    rng: &mut SimulationRng,
) -> Result<(Environment, GrayImage), SimError> {
    let mut environment = match &world.map_image {
        Some(path) => Environment::from_file(path)?,
        None => {
            info!(
                "Generating {}x{} procedural map",
                world.map_width, world.map_height
            );
            Environment::new(generate_map(world.map_width, world.map_height, rng))
        }
    };

    let reference = match &world.landmark_image {
        Some(path) => load_gray(path)?,
        None => generate_landmark(world.landmark_resolution, rng),
    };

    let size = (world.landmark_size[0], world.landmark_size[1]);
    match world.landmark_position {
        Some([x, y]) => environment.place_landmark(reference.clone(), Position2D::new(x, y), size)?,
        None => environment.place_landmark_at_center(reference.clone(), size)?,
    }
    Ok((environment, reference))
}

/// The tick loop: one camera frame in, one command out.
pub struct SimulationRunner {
    config: ScenarioConfig,
    environment: Environment,
    drone: DroneModel,
    mission: MissionStateMachine,
    previous_frame: Option<GrayImage>,
    start_position: Position2D,
    last_status: Option<MissionStatus>,
    halted: bool,
}

impl SimulationRunner {
    /// Builds the world and the real vision pipeline from a scenario.
    pub fn from_config(config: ScenarioConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut rng = SimulationRng::from_seed(config.simulation.seed);
        let (environment, reference) = build_world(&config.world, &mut rng)?;
        let detector = LandmarkDetector::new(&reference, config.detector.clone())?;
        let odometry = VisualOdometryEstimator::new(config.odometry.clone())?;
        Self::with_sensors(config, environment, Box::new(detector), Box::new(odometry))
    }

    /// Builds a runner around caller-supplied vision sensors.
    pub fn with_sensors(
        config: ScenarioConfig,
        environment: Environment,
        landmark_sensor: Box<dyn LandmarkSensor>,
        motion_sensor: Box<dyn MotionSensor>,
    ) -> Result<Self, SimError> {
        let route = config.mission.route();
        let start_position = match (config.drone.start_position, route.first()) {
            (Some([x, y]), _) => Position2D::new(x, y),
            (None, Some(first)) => *first,
            (None, None) => {
                return Err(PerchError::Configuration("mission has no waypoints".to_string()).into())
            }
        };
        let mission = MissionStateMachine::new(
            route,
            config.mission.thresholds.clone(),
            landmark_sensor,
            motion_sensor,
        )?;
        let drone = DroneModel::new(
            config.drone.physics.clone(),
            start_position,
            config.drone.start_altitude,
        );
        Ok(Self {
            config,
            environment,
            drone,
            mission,
            previous_frame: None,
            start_position,
            last_status: None,
            halted: false,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn drone(&self) -> &DroneModel {
        &self.drone
    }

    pub fn mission(&self) -> &MissionStateMachine {
        &self.mission
    }

    pub fn last_status(&self) -> Option<&MissionStatus> {
        self.last_status.as_ref()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Advances one tick.
    ///
    /// An out-of-bounds camera request halts the runner for good: this and
    /// every later call fail, and a fresh runner is needed.
    pub fn step(&mut self) -> Result<StepOutcome, SimError> {
        if self.halted {
            return Err(SimError::Halted);
        }

        let frame = match self.environment.get_frame(
            &self.drone.position(),
            self.config.camera_size(),
            self.drone.altitude(),
        ) {
            Ok(frame) => frame,
            Err(e) => {
                self.halted = true;
                error!("Drone is out of bounds, halting mission: {}", e);
                if let Some(status) = &self.last_status {
                    error!("Last status: {}", status);
                }
                return Err(e.into());
            }
        };

        let previous_mode = self.mission.mode();
        let input = TickInput {
            frame: &frame,
            previous_frame: self.previous_frame.as_ref(),
            landmark: self.environment.landmark_position(),
        };
        let status = self.mission.tick(&input, &mut self.drone);
        self.previous_frame = Some(frame);

        if status.mode != previous_mode {
            info!(
                "Tick {}: {} -> {}",
                status.tick, previous_mode, status.mode
            );
        }
        if let Some(detection) = status.detection.as_ref().filter(|d| !d.is_detected()) {
            if detection.confidence > 0.0 {
                debug!(
                    "Landmark candidate rejected: confidence {:.2}, {} matches",
                    detection.confidence, detection.good_matches
                );
            }
        }
        debug!("{}", status);

        self.last_status = Some(status.clone());
        Ok(if status.is_completed() {
            StepOutcome::Completed(status)
        } else {
            StepOutcome::Running(status)
        })
    }

    /// Steps until the mission completes or `simulation.max_ticks` is reached.
    pub fn run(&mut self) -> Result<RunSummary, SimError> {
        let max_ticks = self.config.simulation.max_ticks;
        info!("Starting mission, at most {} ticks", max_ticks);

        let mut ticks = 0;
        let mut completed = false;
        while ticks < max_ticks {
            let outcome = self.step()?;
            ticks += 1;
            if outcome.is_completed() {
                completed = true;
                info!("Landing completed successfully after {} ticks", ticks);
                break;
            }
        }
        if !completed {
            warn!("Mission did not complete within {} ticks", max_ticks);
        }
        Ok(self.summary(ticks, completed))
    }

    fn summary(&self, ticks: u64, completed: bool) -> RunSummary {
        RunSummary {
            ticks,
            completed,
            last_status: self.last_status.clone(),
            drone: self.drone.status(),
            odometry_samples: self.mission.odometry().len(),
            cumulative_odometry: self.mission.odometry().cumulative(),
        }
    }

    /// Puts the drone back on its start pose and restarts the mission.
    ///
    /// A halted runner stays halted.
    pub fn reset(&mut self) {
        self.drone
            .reset(self.start_position, self.config.drone.start_altitude);
        self.mission.reset();
        self.previous_frame = None;
        self.last_status = None;
        info!("Simulation reset");
    }
}
