// perch_core/src/control/approach.rs

use crate::types::{Command, Position2D};
use nalgebra::Vector2;

/// Output of one approach decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachCommand {
    pub command: Command,
    /// `landmark - camera_center`, in pixels.
    pub error: Vector2<f64>,
    /// Euclidean norm of `error`.
    pub distance: f64,
}

/// Steers the landmark into the middle of the view, then descends.
///
/// Horizontal correction takes priority over vertical, and vertical over
/// descent. Each axis is corrected only while its error strictly exceeds the
/// threshold, so a centred landmark never makes the drone move sideways.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachController {
    pub threshold: f64,
}

impl Default for ApproachController {
    fn default() -> Self {
        Self { threshold: 15.0 }
    }
}

impl ApproachController {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Never returns `Hold`; that is left to callers with no landmark at all.
    pub fn command(&self, camera_center: &Position2D, landmark_center: &Position2D) -> ApproachCommand {
        let error = landmark_center - camera_center;

        let command = if error.x.abs() > self.threshold {
            Command::horizontal(error.x)
        } else if error.y.abs() > self.threshold {
            // Image Y grows downward: a landmark above centre means forward.
            Command::vertical(error.y)
        } else {
            Command::Descend
        };

        ApproachCommand {
            command,
            error,
            distance: error.norm(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn center() -> Position2D {
        Position2D::new(320.0, 240.0)
    }

    #[test]
    fn centred_landmark_descends() {
        let out = ApproachController::default().command(&center(), &Position2D::new(320.0, 240.0));
        assert_eq!(out.command, Command::Descend);
        assert_eq!(out.error, Vector2::zeros());
        assert_abs_diff_eq!(out.distance, 0.0);
    }

    #[test]
    fn horizontal_error_moves_right() {
        let out = ApproachController::default().command(&center(), &Position2D::new(340.0, 240.0));
        assert_eq!(out.command, Command::MoveRight);
        assert_eq!(out.error, Vector2::new(20.0, 0.0));
        assert_abs_diff_eq!(out.distance, 20.0);
    }

    #[test]
    fn landmark_above_centre_moves_forward() {
        let out = ApproachController::default().command(&center(), &Position2D::new(320.0, 220.0));
        assert_eq!(out.command, Command::MoveForward);
        assert_eq!(out.error, Vector2::new(0.0, -20.0));
    }

    #[test]
    fn horizontal_correction_wins_over_vertical() {
        let out = ApproachController::default().command(&center(), &Position2D::new(290.0, 300.0));
        assert_eq!(out.command, Command::MoveLeft);
        assert_abs_diff_eq!(out.distance, (30.0f64 * 30.0 + 60.0 * 60.0).sqrt());
    }

    #[test]
    fn error_at_threshold_is_centred() {
        // Strictly greater is required to move.
        let out = ApproachController::default().command(&center(), &Position2D::new(335.0, 255.0));
        assert_eq!(out.command, Command::Descend);
    }

    #[test]
    fn custom_threshold_is_respected() {
        let tight = ApproachController::new(5.0);
        let out = tight.command(&center(), &Position2D::new(320.0, 246.0));
        assert_eq!(out.command, Command::MoveBackward);
    }
}
