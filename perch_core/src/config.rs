// perch_core/src/config.rs

//! Numeric tuning for every stage of the pipeline.
//!
//! Defaults reproduce the behaviour the thresholds were calibrated against. All
//! structs are `#[serde(default)]`, so a scenario file only needs to list the
//! values it overrides.

use crate::error::{PerchError, Result};
use serde::{Deserialize, Serialize};

// =========================================================================
// == Feature Extraction ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureConfig {
    /// Hard cap on keypoints kept per image (bounds per-frame cost).
    pub max_features: usize,
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Side of the non-maximum suppression grid cell, in pixels of each level.
    pub nms_cell: usize,
    /// Number of pyramid levels (1 disables the pyramid).
    pub levels: usize,
    /// Downscale factor between consecutive pyramid levels.
    pub scale_factor: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_features: 2000,
            fast_threshold: 20,
            nms_cell: 8,
            levels: 4,
            scale_factor: 1.2,
        }
    }
}

impl FeatureConfig {
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = max_features;
        self
    }

    fn validate(&self, owner: &str) -> Result<()> {
        if self.max_features == 0 || self.nms_cell == 0 || self.levels == 0 {
            return Err(PerchError::Configuration(format!(
                "{owner}: max_features, nms_cell and levels must be non-zero"
            )));
        }
        if self.scale_factor <= 1.0 {
            return Err(PerchError::Configuration(format!(
                "{owner}: scale_factor must be greater than 1.0, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

// =========================================================================
// == Robust Homography ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RansacConfig {
    /// Maximum reprojection error (pixels) for a correspondence to count as an inlier.
    pub inlier_threshold: f64,
    pub max_iterations: usize,
    /// Seed for hypothesis sampling. Fixed so identical inputs give identical fits.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            inlier_threshold: 5.0,
            max_iterations: 500,
            seed: 0x5EED_0F_F1A7,
        }
    }
}

// =========================================================================
// == Landmark Detector ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// Extraction settings for the one-off reference image.
    pub reference: FeatureConfig,
    /// Extraction settings for each camera frame.
    pub frame: FeatureConfig,
    /// Lowe ratio: keep a match only if best < ratio * second best.
    pub ratio: f64,
    pub min_matches: usize,
    /// Divisor turning mean Hamming distance into a confidence score.
    pub distance_normalizer: f64,
    /// Minimum confidence before a homography is attempted.
    pub confidence_threshold: f64,
    /// RANSAC inliers a homography needs before it counts as a detection.
    pub min_inliers: usize,
    /// Fraction of the good matches that must be RANSAC inliers.
    pub min_inlier_ratio: f64,
    pub ransac: RansacConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            reference: FeatureConfig::default().with_max_features(1000),
            frame: FeatureConfig::default(),
            ratio: 0.7,
            min_matches: 15,
            distance_normalizer: 100.0,
            confidence_threshold: 0.6,
            min_inliers: 10,
            min_inlier_ratio: 0.3,
            ransac: RansacConfig::default(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        self.reference.validate("detector.reference")?;
        self.frame.validate("detector.frame")?;
        validate_ratio(self.ratio, "detector.ratio")?;
        validate_positive(self.distance_normalizer, "detector.distance_normalizer")?;
        validate_unit(self.confidence_threshold, "detector.confidence_threshold")?;
        validate_unit(self.min_inlier_ratio, "detector.min_inlier_ratio")?;
        if self.min_inliers < 4 {
            return Err(PerchError::Configuration(format!(
                "detector.min_inliers must be at least 4, got {}",
                self.min_inliers
            )));
        }
        validate_positive(self.ransac.inlier_threshold, "detector.ransac.inlier_threshold")
    }
}

// =========================================================================
// == Visual Odometry ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OdometryConfig {
    pub features: FeatureConfig,
    pub ratio: f64,
    /// Both frames need at least this many features.
    pub min_features: usize,
    pub min_matches: usize,
    /// Match count at which confidence saturates to 1.0.
    pub match_normalizer: f64,
    pub ransac: RansacConfig,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default().with_max_features(1000),
            ratio: 0.7,
            min_features: 10,
            min_matches: 5,
            match_normalizer: 100.0,
            ransac: RansacConfig::default(),
        }
    }
}

impl OdometryConfig {
    pub fn validate(&self) -> Result<()> {
        self.features.validate("odometry.features")?;
        validate_ratio(self.ratio, "odometry.ratio")?;
        validate_positive(self.match_normalizer, "odometry.match_normalizer")?;
        validate_positive(self.ransac.inlier_threshold, "odometry.ransac.inlier_threshold")
    }
}

// =========================================================================
// == Mission Thresholds ==
// =========================================================================

/// Every threshold consumed by the mission state machine and its controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MissionThresholds {
    /// Radius (map px) at which a waypoint counts as reached. Strict `<`.
    pub waypoint_radius: f64,
    /// Pixel tolerance for the camera-space approach controller.
    pub centering_tolerance: f64,
    /// Map distance under which cruise escalates straight to landing.
    pub map_escalation_distance: f64,
    /// Detection confidence required for a vision-triggered escalation (strict `>`).
    pub vision_escalation_confidence: f64,
    /// Camera-space approach distance required for a vision-triggered escalation.
    pub vision_escalation_distance: f64,
    /// Detection confidence required to steer the landing by vision (strict `>`).
    pub landing_confidence: f64,
    /// Map distance under which the landing fallback does a final approach.
    pub final_approach_distance: f64,
    /// Pixel tolerance for the map-space final approach.
    pub final_approach_tolerance: f64,
    /// A descend commanded at or below this altitude completes the landing.
    pub landing_altitude: f64,
    /// Odometry samples at or below this confidence are not buffered.
    pub odometry_min_confidence: f64,
    /// Capacity of the rolling odometry buffer.
    pub odometry_window: usize,
}

impl Default for MissionThresholds {
    fn default() -> Self {
        Self {
            waypoint_radius: 25.0,
            centering_tolerance: 15.0,
            map_escalation_distance: 100.0,
            vision_escalation_confidence: 0.6,
            vision_escalation_distance: 80.0,
            landing_confidence: 0.5,
            final_approach_distance: 50.0,
            final_approach_tolerance: 5.0,
            landing_altitude: 10.0,
            odometry_min_confidence: 0.3,
            odometry_window: 10,
        }
    }
}

impl MissionThresholds {
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.waypoint_radius, "mission.waypoint_radius")?;
        validate_positive(self.centering_tolerance, "mission.centering_tolerance")?;
        validate_positive(self.map_escalation_distance, "mission.map_escalation_distance")?;
        validate_positive(self.vision_escalation_distance, "mission.vision_escalation_distance")?;
        validate_positive(self.final_approach_distance, "mission.final_approach_distance")?;
        validate_positive(self.final_approach_tolerance, "mission.final_approach_tolerance")?;
        validate_unit(self.vision_escalation_confidence, "mission.vision_escalation_confidence")?;
        validate_unit(self.landing_confidence, "mission.landing_confidence")?;
        validate_unit(self.odometry_min_confidence, "mission.odometry_min_confidence")?;
        if self.odometry_window == 0 {
            return Err(PerchError::Configuration(
                "mission.odometry_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// --- Validation helpers ---

fn validate_positive(value: f64, name: &str) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PerchError::Configuration(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

fn validate_unit(value: f64, name: &str) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PerchError::Configuration(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}

fn validate_ratio(value: f64, name: &str) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(PerchError::Configuration(format!(
            "{name} must lie in (0, 1], got {value}"
        )))
    }
}
