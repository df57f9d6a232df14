// perch_core/src/error.rs

use thiserror::Error;

/// Errors that escape the decision pipeline.
///
/// Vision failures (too few features, failed ratio test, degenerate homography)
/// are deliberately absent: they are expected outcomes and surface as
/// zero-confidence results instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PerchError {
    /// Invalid mission setup, e.g. fewer than two waypoints.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The landmark reference image could not be turned into a usable feature set.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// The requested camera view does not fit inside the map.
    #[error(
        "camera view at ({x:.1}, {y:.1}) of size {view_width}x{view_height} lies outside the {map_width}x{map_height} map"
    )]
    OutOfBounds {
        x: f64,
        y: f64,
        view_width: u32,
        view_height: u32,
        map_width: u32,
        map_height: u32,
    },
}

pub type Result<T> = std::result::Result<T, PerchError>;
