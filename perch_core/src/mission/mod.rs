// perch_core/src/mission/mod.rs

//! The tick-driven cruise / landing / completed state machine.

pub mod odometry_buffer;
pub mod status;

pub use odometry_buffer::OdometryBuffer;
pub use status::{Escalation, LandingGuidance, MissionStatus};

use crate::abstractions::MotionExecutor;
use crate::config::MissionThresholds;
use crate::control::ApproachController;
use crate::error::Result;
use crate::navigation::{WaypointNavigator, WaypointProgress};
use crate::perception::{Detection, LandmarkSensor, MotionSensor, OdometryResult};
use crate::types::{distance, Command, MissionMode, Position2D};
use image::GrayImage;
use tracing::{debug, info};

/// What the state machine sees on one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    /// Camera frame captured before this tick's command is applied.
    pub frame: &'a GrayImage,
    /// Frame from the previous tick, for odometry.
    pub previous_frame: Option<&'a GrayImage>,
    /// Known map position of the landmark, if one is placed.
    pub landmark: Option<Position2D>,
}

/// Per-tick scratch that becomes a [`MissionStatus`].
#[derive(Debug)]
struct TickRecord {
    command: Command,
    target: Option<Position2D>,
    /// Computed at most once per tick and shared by every check that needs it.
    detection: Option<Detection>,
    odometry: Option<OdometryResult>,
    guidance: Option<LandingGuidance>,
    escalation: Option<Escalation>,
    landed: bool,
}

impl Default for TickRecord {
    fn default() -> Self {
        Self {
            command: Command::Hold,
            target: None,
            detection: None,
            odometry: None,
            guidance: None,
            escalation: None,
            landed: false,
        }
    }
}

pub struct MissionStateMachine {
    mode: MissionMode,
    navigator: WaypointNavigator,
    /// Camera-space centring.
    approach: ApproachController,
    /// Map-space centring for the final approach without vision.
    final_approach: ApproachController,
    thresholds: MissionThresholds,
    landmark_sensor: Box<dyn LandmarkSensor>,
    motion_sensor: Box<dyn MotionSensor>,
    odometry: OdometryBuffer,
    ticks: u64,
}

impl MissionStateMachine {
    /// Fails with a configuration error for fewer than two waypoints or invalid thresholds.
    pub fn new(
        waypoints: Vec<Position2D>,
        thresholds: MissionThresholds,
        landmark_sensor: Box<dyn LandmarkSensor>,
        motion_sensor: Box<dyn MotionSensor>,
    ) -> Result<Self> {
        thresholds.validate()?;
        let navigator = WaypointNavigator::new(waypoints, thresholds.waypoint_radius)?;
        Ok(Self {
            mode: MissionMode::Cruise,
            navigator,
            approach: ApproachController::new(thresholds.centering_tolerance),
            final_approach: ApproachController::new(thresholds.final_approach_tolerance),
            odometry: OdometryBuffer::new(thresholds.odometry_window),
            thresholds,
            landmark_sensor,
            motion_sensor,
            ticks: 0,
        })
    }

    pub fn mode(&self) -> MissionMode {
        self.mode
    }

    pub fn navigator(&self) -> &WaypointNavigator {
        &self.navigator
    }

    pub fn odometry(&self) -> &OdometryBuffer {
        &self.odometry
    }

    pub fn thresholds(&self) -> &MissionThresholds {
        &self.thresholds
    }

    pub fn progress(&self) -> WaypointProgress {
        self.navigator.progress()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Runs one decision step and applies its command through `executor`.
    pub fn tick(
        &mut self,
        input: &TickInput<'_>,
        executor: &mut dyn MotionExecutor,
    ) -> MissionStatus {
        self.ticks += 1;
        let mut record = TickRecord::default();

        match self.mode {
            MissionMode::Cruise => self.cruise(input, executor, &mut record),
            MissionMode::Landing => self.landing(input, executor, &mut record),
            MissionMode::Completed => {}
        }

        MissionStatus {
            tick: self.ticks,
            mode: self.mode,
            command: record.command,
            target: record.target,
            detection: record.detection,
            odometry: record.odometry,
            progress: self.navigator.progress(),
            guidance: record.guidance,
            escalation: record.escalation,
            landmark_distance: landmark_distance(input.landmark, &executor.position()),
            landed: record.landed,
        }
    }

    /// Back to cruise at the first waypoint with an empty odometry window.
    pub fn reset(&mut self) {
        self.mode = MissionMode::Cruise;
        self.navigator.reset();
        self.odometry.clear();
        self.ticks = 0;
        info!("Mission reset");
    }

    // --- Cruise ---

    fn cruise(
        &mut self,
        input: &TickInput<'_>,
        executor: &mut dyn MotionExecutor,
        record: &mut TickRecord,
    ) {
        let step = self.navigator.advance(&executor.position());
        record.command = step.command;
        record.target = step.target;
        if step.command == Command::ReachedDestination {
            self.enter_landing(Escalation::RouteComplete, record);
            return;
        }
        executor.execute(step.command);

        if let Some(previous) = input.previous_frame {
            let estimate = self.motion_sensor.estimate_motion(Some(previous), input.frame);
            if estimate.confidence > self.thresholds.odometry_min_confidence {
                self.odometry.push(estimate);
            }
            record.odometry = Some(estimate);
        }

        // Map-space and vision-space proximity are independent triggers.
        let map_distance = landmark_distance(input.landmark, &executor.position());
        if map_distance < self.thresholds.map_escalation_distance {
            self.enter_landing(
                Escalation::MapProximity {
                    distance: map_distance,
                },
                record,
            );
        }

        let min_confidence = self.thresholds.vision_escalation_confidence;
        let sighting = detect(self.landmark_sensor.as_mut(), record, input.frame)
            .result
            .as_ref()
            .filter(|result| result.confidence > min_confidence)
            .map(|result| (result.center, result.confidence));
        if let Some((center, confidence)) = sighting {
            let approach = self.approach.command(&camera_center(input.frame), &center);
            if approach.distance < self.thresholds.vision_escalation_distance {
                self.enter_landing(
                    Escalation::VisionLock {
                        confidence,
                        distance: approach.distance,
                    },
                    record,
                );
            }
        }
    }

    fn enter_landing(&mut self, escalation: Escalation, record: &mut TickRecord) {
        if self.mode == MissionMode::Landing {
            return;
        }
        info!("Switching to landing mode: {:?}", escalation);
        self.mode = MissionMode::Landing;
        record.escalation = Some(escalation);
    }

    // --- Landing ---

    fn landing(
        &mut self,
        input: &TickInput<'_>,
        executor: &mut dyn MotionExecutor,
        record: &mut TickRecord,
    ) {
        let min_confidence = self.thresholds.landing_confidence;
        let sighting = detect(self.landmark_sensor.as_mut(), record, input.frame)
            .result
            .as_ref()
            .filter(|result| result.confidence > min_confidence)
            .map(|result| result.center);

        if let Some(center) = sighting {
            let approach = self.approach.command(&camera_center(input.frame), &center);
            record.guidance = Some(LandingGuidance::Vision {
                error: approach.error,
                distance: approach.distance,
            });
            self.apply_landing_command(approach.command, executor, record);
            return;
        }

        // Landmark not seen: fall back to its map position.
        let position = executor.position();
        let map_distance = landmark_distance(input.landmark, &position);
        match input.landmark {
            Some(landmark) if map_distance < self.thresholds.final_approach_distance => {
                let approach = self.final_approach.command(&position, &landmark);
                record.guidance = Some(LandingGuidance::MapFinalApproach {
                    error: approach.error,
                    distance: map_distance,
                });
                self.apply_landing_command(approach.command, executor, record);
            }
            _ if map_distance >= self.thresholds.map_escalation_distance
                && !self.navigator.is_destination_reached() =>
            {
                info!(
                    "Landmark lost {:.1} px away with route remaining, resuming cruise",
                    map_distance
                );
                self.mode = MissionMode::Cruise;
                self.cruise(input, executor, record);
                record.guidance = Some(LandingGuidance::ReturnToRoute {
                    distance: map_distance,
                });
            }
            Some(landmark) => {
                executor.reduce_to_min_speed();
                let delta = landmark - position;
                let command = Command::toward(delta.x, delta.y);
                executor.execute(command);
                record.command = command;
                record.guidance = Some(LandingGuidance::Search {
                    distance: map_distance,
                });
                debug!("Searching for landmark, map distance {:.1}", map_distance);
            }
            None => {
                // Nowhere to search toward.
                executor.reduce_to_min_speed();
                record.command = Command::Hold;
                record.guidance = Some(LandingGuidance::Search {
                    distance: map_distance,
                });
            }
        }
    }

    /// Executes a landing command. A `Descend` issued at or below the landing
    /// altitude completes the mission.
    fn apply_landing_command(
        &mut self,
        command: Command,
        executor: &mut dyn MotionExecutor,
        record: &mut TickRecord,
    ) {
        let altitude = executor.altitude();
        executor.execute(command);
        record.command = command;
        if command == Command::Descend && altitude <= self.thresholds.landing_altitude {
            self.mode = MissionMode::Completed;
            record.landed = true;
            info!("Landing completed at altitude {:.1}", executor.altitude());
        }
    }
}

fn detect<'r>(
    sensor: &mut dyn LandmarkSensor,
    record: &'r mut TickRecord,
    frame: &GrayImage,
) -> &'r Detection {
    record
        .detection
        .get_or_insert_with(|| sensor.detect_landmark(frame))
}

fn camera_center(frame: &GrayImage) -> Position2D {
    Position2D::new((frame.width() / 2) as f64, (frame.height() / 2) as f64)
}

fn landmark_distance(landmark: Option<Position2D>, position: &Position2D) -> f64 {
    landmark.map_or(f64::INFINITY, |landmark| distance(position, &landmark))
}
