// perch_core/src/perception/mod.rs

use image::GrayImage;

pub mod landmark;
pub mod odometry;

// --- Re-export the public structs for a clean API ---
pub use landmark::{Detection, DetectionResult, LandmarkDetector};
pub use odometry::{OdometryMethod, OdometryResult, VisualOdometryEstimator};

// --- The Sensor Traits ("Contracts") ---

/// The contract for anything that can look for the landing landmark in a camera frame.
/// `LandmarkDetector` is the real implementation; tests substitute scripted ones.
pub trait LandmarkSensor: Send {
    /// Never fails: every problem degrades to a detection without a result.
    fn detect_landmark(&mut self, frame: &GrayImage) -> Detection;
}

/// The contract for anything that estimates image motion between consecutive frames.
pub trait MotionSensor: Send {
    /// A missing previous frame yields the neutral, zero-confidence result.
    fn estimate_motion(&mut self, previous: Option<&GrayImage>, current: &GrayImage)
        -> OdometryResult;
}

impl LandmarkSensor for LandmarkDetector {
    fn detect_landmark(&mut self, frame: &GrayImage) -> Detection {
        self.detect(frame)
    }
}

impl MotionSensor for VisualOdometryEstimator {
    fn estimate_motion(
        &mut self,
        previous: Option<&GrayImage>,
        current: &GrayImage,
    ) -> OdometryResult {
        self.estimate(previous, Some(current))
    }
}
