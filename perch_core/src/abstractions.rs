// perch_core/src/abstractions.rs

use image::GrayImage;

use crate::{
    error::Result,
    types::{distance, Command, Position2D},
};

// --- CAMERA FRAME PROVIDER TRAIT ---
/// Supplies the downward camera view for a drone pose.
///
/// Errors (notably [`crate::error::PerchError::OutOfBounds`]) are mission-fatal:
/// the driver must halt the run instead of retrying.
pub trait FrameProvider {
    /// Renders a `size.0 x size.1` grayscale frame centred on `position`.
    /// Higher `altitude` shows a wider patch of the map.
    fn get_frame(&self, position: &Position2D, size: (u32, u32), altitude: f64)
        -> Result<GrayImage>;
}

// --- LANDMARK ORACLE TRAIT ---
/// Ground-truth knowledge of where the landing landmark sits on the map.
pub trait LandmarkOracle {
    /// `None` until a landmark has been placed.
    fn landmark_position(&self) -> Option<Position2D>;

    /// Map distance from `position` to the landmark; infinite if none is placed.
    fn distance_to(&self, position: &Position2D) -> f64 {
        self.landmark_position()
            .map_or(f64::INFINITY, |landmark| distance(position, &landmark))
    }
}

// --- MOTION EXECUTOR TRAIT ---
/// Owns the drone's position and altitude and applies one command per tick.
///
/// Velocity and battery bookkeeping are internal to the implementation.
pub trait MotionExecutor {
    /// Applies a command. `Descend` lowers the altitude by the descent rate.
    /// Non-motion commands (`Hold`, `ReachedDestination`) leave the pose unchanged.
    fn execute(&mut self, command: Command);

    fn position(&self) -> Position2D;

    fn altitude(&self) -> f64;

    /// Drops the cruise speed to its minimum, used while searching for a lost landmark.
    fn reduce_to_min_speed(&mut self);
}
