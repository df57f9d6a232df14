// perch_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::abstractions::{FrameProvider, LandmarkOracle, MotionExecutor};
pub use crate::perception::{LandmarkSensor, MotionSensor};

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::error::{PerchError, Result};
pub use crate::types::{distance, Command, MissionMode, Position2D};

// --- Configuration ---
pub use crate::config::{
    DetectorConfig, FeatureConfig, MissionThresholds, OdometryConfig, RansacConfig,
};

// --- Pipeline Components ---
pub use crate::control::{ApproachCommand, ApproachController};
pub use crate::mission::{
    Escalation, LandingGuidance, MissionStateMachine, MissionStatus, OdometryBuffer, TickInput,
};
pub use crate::navigation::{WaypointNavigator, WaypointProgress, WaypointStep};
pub use crate::perception::{
    Detection, DetectionResult, LandmarkDetector, OdometryMethod, OdometryResult,
    VisualOdometryEstimator,
};
