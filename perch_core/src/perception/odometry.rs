// perch_core/src/perception/odometry.rs

use crate::config::OdometryConfig;
use crate::error::Result;
use crate::types::Position2D;
use crate::vision::{DescriptorMatcher, FeatureExtractor, FeatureSet, RansacEstimator};
use image::GrayImage;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// How an odometry displacement was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OdometryMethod {
    /// Not enough data; displacement is zero.
    #[default]
    None,
    /// Translation component of a RANSAC homography.
    Homography,
    /// Mean displacement of the ratio-test matches.
    MeanDisplacement,
}

/// Apparent image motion between two frames, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OdometryResult {
    pub dx: f64,
    pub dy: f64,
    pub confidence: f64,
    pub matches: usize,
    pub method: OdometryMethod,
}

impl OdometryResult {
    /// Zero displacement, zero confidence.
    pub fn neutral() -> Self {
        Self::default()
    }

    pub fn displacement(&self) -> Vector2<f64> {
        Vector2::new(self.dx, self.dy)
    }
}

pub struct VisualOdometryEstimator {
    config: OdometryConfig,
    extractor: FeatureExtractor,
    matcher: DescriptorMatcher,
    ransac: RansacEstimator,
}

impl VisualOdometryEstimator {
    pub fn new(config: OdometryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            ransac: RansacEstimator::new(config.ransac.clone()),
            matcher: DescriptorMatcher,
            config,
        })
    }

    pub fn config(&self) -> &OdometryConfig {
        &self.config
    }

    /// Estimates how the image content moved from `previous` to `current`.
    /// Either frame missing yields [`OdometryResult::neutral`].
    pub fn estimate(&self, previous: Option<&GrayImage>, current: Option<&GrayImage>) -> OdometryResult {
        let (Some(previous), Some(current)) = (previous, current) else {
            return OdometryResult::neutral();
        };
        let prev_features = self.extractor.extract(previous);
        let curr_features = self.extractor.extract(current);
        self.estimate_features(&prev_features, &curr_features)
    }

    pub fn estimate_features(&self, previous: &FeatureSet, current: &FeatureSet) -> OdometryResult {
        if previous.len() < self.config.min_features || current.len() < self.config.min_features {
            return OdometryResult::neutral();
        }
        let Some(good) =
            self.matcher
                .ratio_matches(previous.descriptors(), current.descriptors(), self.config.ratio)
        else {
            return OdometryResult::neutral();
        };
        if good.len() < self.config.min_matches {
            return OdometryResult::neutral();
        }

        let src: Vec<Position2D> = good.iter().map(|m| previous.point(m.query_idx)).collect();
        let dst: Vec<Position2D> = good.iter().map(|m| current.point(m.train_idx)).collect();

        let (displacement, method) = match self.ransac.estimate(&src, &dst) {
            Some(fit) => (fit.homography.translation(), OdometryMethod::Homography),
            None => (mean_displacement(&src, &dst), OdometryMethod::MeanDisplacement),
        };
        let confidence = (good.len() as f64 / self.config.match_normalizer).min(1.0);
        trace!(
            dx = displacement.x,
            dy = displacement.y,
            confidence,
            matches = good.len(),
            ?method,
            "odometry estimate"
        );

        OdometryResult {
            dx: displacement.x,
            dy: displacement.y,
            confidence,
            matches: good.len(),
            method,
        }
    }
}

fn mean_displacement(src: &[Position2D], dst: &[Position2D]) -> Vector2<f64> {
    let sum = src
        .iter()
        .zip(dst)
        .fold(Vector2::zeros(), |acc, (s, d)| acc + (d - s));
    sum / src.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureConfig;
    use crate::vision::test_support::{block_texture, shifted, BACKGROUND};
    use approx::assert_abs_diff_eq;
    use image::Luma;

    fn estimator() -> VisualOdometryEstimator {
        VisualOdometryEstimator::new(OdometryConfig {
            features: FeatureConfig {
                levels: 1,
                max_features: 1000,
                ..FeatureConfig::default()
            },
            ..OdometryConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn missing_previous_frame_is_neutral() {
        let frame = block_texture(320, 240, 8, 1);
        let result = estimator().estimate(None, Some(&frame));
        assert_eq!(result, OdometryResult::neutral());
        assert_eq!(result.method, OdometryMethod::None);
    }

    #[test]
    fn featureless_frames_are_neutral() {
        let blank = GrayImage::from_pixel(320, 240, Luma([BACKGROUND]));
        let result = estimator().estimate(Some(&blank), Some(&blank));
        assert_eq!(result, OdometryResult::neutral());
    }

    #[test]
    fn identical_frames_have_zero_motion() {
        let frame = block_texture(320, 240, 8, 3);
        let result = estimator().estimate(Some(&frame), Some(&frame));

        assert_eq!(result.method, OdometryMethod::Homography);
        assert_abs_diff_eq!(result.dx, 0.0, epsilon = 0.5);
        assert_abs_diff_eq!(result.dy, 0.0, epsilon = 0.5);
        assert!(result.confidence > 0.3);
    }

    #[test]
    fn recovers_horizontal_shift() {
        let previous = block_texture(320, 240, 8, 7);
        let current = shifted(&previous, 16, 0);
        let result = estimator().estimate(Some(&previous), Some(&current));

        assert_abs_diff_eq!(result.dx, 16.0, epsilon = 1.0);
        assert_abs_diff_eq!(result.dy, 0.0, epsilon = 1.0);
        assert!(result.confidence > 0.3);
        assert!(result.confidence <= 1.0);
    }

    #[test]
    fn mean_displacement_averages_matches() {
        let src = [Position2D::new(0.0, 0.0), Position2D::new(10.0, 10.0)];
        let dst = [Position2D::new(2.0, 1.0), Position2D::new(14.0, 13.0)];
        let mean = mean_displacement(&src, &dst);
        assert_abs_diff_eq!(mean.x, 3.0);
        assert_abs_diff_eq!(mean.y, 2.0);
    }

    #[test]
    fn confidence_saturates_at_normalizer() {
        let estimator = estimator();
        let frame = block_texture(640, 480, 8, 11);
        let result = estimator.estimate(Some(&frame), Some(&frame));
        assert!(result.matches >= 100, "expected a dense match set, got {}", result.matches);
        assert_abs_diff_eq!(result.confidence, 1.0);
    }
}
