// perch_sim/tests/mission_loop.rs

//! Drives the full tick loop on a small generated world.

use approx::assert_abs_diff_eq;
use image::GrayImage;
use perch_sim::prelude::*;

/// A camera that never recognises the landmark, so landing relies on the map.
struct Blind;

impl LandmarkSensor for Blind {
    fn detect_landmark(&mut self, _frame: &GrayImage) -> Detection {
        Detection::miss()
    }
}

struct NoMotion;

impl MotionSensor for NoMotion {
    fn estimate_motion(
        &mut self,
        _previous: Option<&GrayImage>,
        _current: &GrayImage,
    ) -> OdometryResult {
        OdometryResult::neutral()
    }
}

fn small_scenario() -> ScenarioConfig {
    parse_scenario(
        r#"
        [simulation]
        seed = 7
        max_ticks = 2000
        camera_width = 64
        camera_height = 48

        [world]
        map_width = 400
        map_height = 300
        landmark_resolution = 40
        landmark_position = [200.0, 150.0]
        landmark_size = [20, 20]

        [mission]
        waypoints = [[40.0, 40.0], [200.0, 40.0], [200.0, 150.0]]
        "#,
    )
    .unwrap()
}

fn blind_runner(config: ScenarioConfig) -> SimulationRunner {
    let mut rng = SimulationRng::from_seed(config.simulation.seed);
    let (environment, _reference) = build_world(&config.world, &mut rng).unwrap();
    SimulationRunner::with_sensors(config, environment, Box::new(Blind), Box::new(NoMotion)).unwrap()
}

#[test]
fn map_guided_landing_completes() {
    let mut runner = blind_runner(small_scenario());

    let mut escalation = None;
    let mut searched = false;
    let mut final_approach = false;
    let status = loop {
        let outcome = runner.step().unwrap();
        let status = outcome.status().clone();
        escalation = escalation.or(status.escalation);
        match status.guidance {
            Some(LandingGuidance::Search { .. }) => searched = true,
            Some(LandingGuidance::MapFinalApproach { .. }) => final_approach = true,
            _ => {}
        }
        if outcome.is_completed() {
            break status;
        }
        assert!(status.tick < 2000, "mission did not complete");
    };

    assert!(matches!(escalation, Some(Escalation::MapProximity { .. })));
    assert!(searched);
    assert!(final_approach);
    assert!(status.landed);
    assert_eq!(status.command, Command::Descend);
    assert_eq!(status.mode, MissionMode::Completed);

    let drone = runner.drone().status();
    assert_abs_diff_eq!(drone.position.x, 200.0, epsilon = 5.0);
    assert_abs_diff_eq!(drone.position.y, 150.0, epsilon = 5.0);
    assert!(drone.altitude <= 10.0);

    // Completed missions keep reporting without moving the drone.
    let after = runner.step().unwrap();
    assert!(after.is_completed());
    assert_eq!(after.status().command, Command::Hold);
    assert_eq!(runner.drone().status().position, drone.position);
}

#[test]
fn run_reports_a_summary() {
    let mut runner = blind_runner(small_scenario());
    let summary = runner.run().unwrap();
    assert!(summary.completed);
    assert!(summary.ticks < 2000);
    assert_eq!(summary.odometry_samples, 0);
    assert_eq!(summary.cumulative_odometry.x, 0.0);
    assert!(summary.drone.battery < 100.0);
    assert_eq!(
        summary.last_status.map(|s| s.mode),
        Some(MissionMode::Completed)
    );
}

#[test]
fn run_stops_at_max_ticks() {
    let mut config = small_scenario();
    config.simulation.max_ticks = 10;
    let mut runner = blind_runner(config);
    let summary = runner.run().unwrap();
    assert!(!summary.completed);
    assert_eq!(summary.ticks, 10);
    assert_eq!(runner.mission().ticks(), 10);
}

#[test]
fn reset_flies_the_route_again() {
    let mut runner = blind_runner(small_scenario());
    assert!(runner.run().unwrap().completed);

    runner.reset();
    assert_eq!(runner.mission().mode(), MissionMode::Cruise);
    assert_eq!(runner.mission().progress().index, 0);
    assert_eq!(runner.drone().status().position, Position2D::new(40.0, 40.0));
    assert_abs_diff_eq!(runner.drone().status().altitude, 150.0);
    assert!(runner.last_status().is_none());

    assert!(runner.run().unwrap().completed);
}

#[test]
fn leaving_the_map_halts_the_runner() {
    let mut config = small_scenario();
    config.drone.start_position = Some([-30.0, 40.0]);
    let mut runner = blind_runner(config);

    let first = runner.step();
    assert!(matches!(
        first,
        Err(SimError::Core(PerchError::OutOfBounds { .. }))
    ));
    assert!(runner.is_halted());
    assert!(matches!(runner.step(), Err(SimError::Halted)));

    // Reset does not revive a halted runner.
    runner.reset();
    assert!(matches!(runner.step(), Err(SimError::Halted)));
}

#[test]
fn camera_view_larger_than_map_is_out_of_bounds() {
    let mut config = small_scenario();
    config.simulation.camera_width = 640;
    config.simulation.camera_height = 480;
    let mut runner = blind_runner(config);
    assert!(matches!(
        runner.step(),
        Err(SimError::Core(PerchError::OutOfBounds { view_width: 960, .. }))
    ));
}

#[test]
fn real_pipeline_runs_a_few_ticks() {
    let mut config = small_scenario();
    config.simulation.camera_width = 160;
    config.simulation.camera_height = 120;
    config.simulation.max_ticks = 5;
    config.world.landmark_resolution = 160;
    let mut runner = SimulationRunner::from_config(config).unwrap();

    let summary = runner.run().unwrap();
    assert_eq!(summary.ticks, 5);
    assert!(!runner.is_halted());
    let status = summary.last_status.unwrap();
    assert_eq!(status.tick, 5);
    // The drone starts on the first waypoint and heads east.
    assert_eq!(status.progress.index, 1);
    assert_eq!(status.command, Command::MoveRight);
    assert!(status.odometry.is_some());
}

#[test]
fn real_pipeline_locks_onto_the_landmark() {
    let config = parse_scenario(
        r#"
        [simulation]
        seed = 11
        max_ticks = 40
        camera_width = 320
        camera_height = 240

        [world]
        map_width = 800
        map_height = 600
        landmark_resolution = 160
        landmark_position = [400.0, 300.0]
        landmark_size = [160, 160]

        [drone]
        start_position = [400.0, 300.0]
        start_altitude = 100.0

        [mission]
        waypoints = [[400.0, 300.0], [600.0, 300.0]]
        "#,
    )
    .unwrap();
    let mut runner = SimulationRunner::from_config(config).unwrap();

    let mut escalation = None;
    let mut vision_ticks = 0;
    for _ in 0..10 {
        let outcome = runner.step().unwrap();
        let status = outcome.status();
        escalation = escalation.or(status.escalation);
        if matches!(status.guidance, Some(LandingGuidance::Vision { .. })) {
            vision_ticks += 1;
        }
        if outcome.is_completed() {
            break;
        }
    }

    assert!(escalation.is_some(), "never switched to landing");
    assert!(
        vision_ticks > 0 || matches!(escalation, Some(Escalation::VisionLock { .. })),
        "landmark never recognised by the detector"
    );
}
