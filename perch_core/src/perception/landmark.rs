// perch_core/src/perception/landmark.rs

//! Finds the landing landmark in a camera frame by matching binary features
//! against a reference image and fitting a homography.

use crate::config::DetectorConfig;
use crate::error::{PerchError, Result};
use crate::types::Position2D;
use crate::vision::{
    ratio_test, DescriptorMatcher, FeatureExtractor, FeatureSet, RansacEstimator,
};
use image::GrayImage;
use tracing::{debug, info};

/// Where the landmark was found in the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Reference corners projected into the frame, in the order top-left,
    /// bottom-left, bottom-right, top-right. Always convex.
    pub quad: [Position2D; 4],
    /// Mean of the four projected corners.
    pub center: Position2D,
    pub confidence: f64,
    /// RANSAC inliers as (reference point, frame point), for overlays.
    pub correspondences: Vec<(Position2D, Position2D)>,
}

/// Outcome of one detection attempt.
///
/// `confidence` is reported even when `result` is `None`, so callers can log
/// near-misses that cleared the match count but not the confidence bar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detection {
    pub result: Option<DetectionResult>,
    pub confidence: f64,
    /// Matches that survived the ratio test.
    pub good_matches: usize,
}

impl Detection {
    /// No usable matches at all: confidence 0.
    pub fn miss() -> Self {
        Self::default()
    }

    /// Enough matches to score, but no accepted detection.
    pub fn rejected(confidence: f64, good_matches: usize) -> Self {
        Self {
            result: None,
            confidence,
            good_matches,
        }
    }

    pub fn found(result: DetectionResult, good_matches: usize) -> Self {
        Self {
            confidence: result.confidence,
            result: Some(result),
            good_matches,
        }
    }

    pub fn is_detected(&self) -> bool {
        self.result.is_some()
    }

    pub fn center(&self) -> Option<Position2D> {
        self.result.as_ref().map(|r| r.center)
    }
}

pub struct LandmarkDetector {
    config: DetectorConfig,
    frame_extractor: FeatureExtractor,
    /// Computed once; immutable for the session.
    reference: FeatureSet,
    reference_size: (u32, u32),
    matcher: DescriptorMatcher,
    ransac: RansacEstimator,
}

impl LandmarkDetector {
    /// Extracts the reference features from the landmark image.
    ///
    /// Fails with [`PerchError::Initialization`] if the image has no usable features.
    pub fn new(reference_image: &GrayImage, config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let reference =
            FeatureExtractor::new(config.reference.clone()).extract(reference_image);
        Self::from_features(reference, reference_image.dimensions(), config)
    }

    /// Builds a detector around a precomputed reference feature set.
    pub fn from_features(
        reference: FeatureSet,
        reference_size: (u32, u32),
        config: DetectorConfig,
    ) -> Result<Self> {
        if reference.is_empty() {
            return Err(PerchError::Initialization(
                "no features detected in landmark image".to_string(),
            ));
        }
        info!(
            "Landmark loaded: {}x{} pixels, {} features",
            reference_size.0,
            reference_size.1,
            reference.len()
        );
        Ok(Self {
            frame_extractor: FeatureExtractor::new(config.frame.clone()),
            ransac: RansacEstimator::new(config.ransac.clone()),
            matcher: DescriptorMatcher,
            reference,
            reference_size,
            config,
        })
    }

    pub fn reference(&self) -> &FeatureSet {
        &self.reference
    }

    pub fn reference_size(&self) -> (u32, u32) {
        self.reference_size
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Extracts frame features and runs [`Self::detect_in`].
    pub fn detect(&self, frame: &GrayImage) -> Detection {
        let features = self.frame_extractor.extract(frame);
        self.detect_in(&features, frame.dimensions())
    }

    /// Matches the reference against already-extracted frame features.
    ///
    /// `frame_size` bounds where the projected landmark may lie.
    pub fn detect_in(&self, frame: &FeatureSet, frame_size: (u32, u32)) -> Detection {
        let min_matches = self.config.min_matches;
        if frame.len() < min_matches {
            return Detection::miss();
        }

        let Some(pairs) = self
            .matcher
            .knn2(self.reference.descriptors(), frame.descriptors())
        else {
            return Detection::miss();
        };
        let good = ratio_test(&pairs, self.config.ratio);
        if good.len() < min_matches {
            return Detection::miss();
        }

        let mean_distance =
            good.iter().map(|m| m.distance as f64).sum::<f64>() / good.len() as f64;
        let confidence = (1.0 - mean_distance / self.config.distance_normalizer).clamp(0.0, 1.0);
        if confidence < self.config.confidence_threshold {
            debug!(confidence, matches = good.len(), "landmark match below confidence threshold");
            return Detection::rejected(confidence, good.len());
        }

        let src: Vec<Position2D> = good.iter().map(|m| self.reference.point(m.query_idx)).collect();
        let dst: Vec<Position2D> = good.iter().map(|m| frame.point(m.train_idx)).collect();
        let Some(fit) = self.ransac.estimate(&src, &dst) else {
            debug!(confidence, matches = good.len(), "landmark homography failed");
            return Detection::rejected(confidence, good.len());
        };
        let inliers = fit.inlier_count();
        if inliers < self.config.min_inliers
            || (inliers as f64) < self.config.min_inlier_ratio * good.len() as f64
        {
            debug!(
                confidence,
                matches = good.len(),
                inliers,
                "landmark homography lacks support"
            );
            return Detection::rejected(confidence, good.len());
        }

        let (w, h) = (
            self.reference_size.0.saturating_sub(1) as f64,
            self.reference_size.1.saturating_sub(1) as f64,
        );
        let corners = [
            Position2D::new(0.0, 0.0),
            Position2D::new(0.0, h),
            Position2D::new(w, h),
            Position2D::new(w, 0.0),
        ];
        let mut quad = [Position2D::origin(); 4];
        for (projected, corner) in quad.iter_mut().zip(&corners) {
            match fit.homography.project(corner) {
                Some(p) => *projected = p,
                None => return Detection::rejected(confidence, good.len()),
            }
        }
        if !is_plausible_quad(&quad, frame_size) {
            debug!(confidence, inliers, "landmark quad is degenerate or off-frame");
            return Detection::rejected(confidence, good.len());
        }
        let center = Position2D::from(
            quad.iter().fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords) / 4.0,
        );

        let correspondences = src
            .iter()
            .zip(&dst)
            .zip(&fit.inliers)
            .filter(|(_, inlier)| **inlier)
            .map(|((s, d), _)| (*s, *d))
            .collect();

        debug!(
            confidence,
            matches = good.len(),
            inliers,
            "landmark detected at ({:.1}, {:.1})",
            center.x,
            center.y
        );
        Detection::found(
            DetectionResult {
                quad,
                center,
                confidence,
                correspondences,
            },
            good.len(),
        )
    }
}

/// A projected landmark must be a convex quad with the reference winding,
/// lying within one frame size of the frame on every side.
fn is_plausible_quad(quad: &[Position2D; 4], frame_size: (u32, u32)) -> bool {
    let (w, h) = (frame_size.0 as f64, frame_size.1 as f64);
    let in_reach = |p: &Position2D| {
        p.x.is_finite() && p.y.is_finite() && (-w..=2.0 * w).contains(&p.x) && (-h..=2.0 * h).contains(&p.y)
    };
    if !quad.iter().all(in_reach) {
        return false;
    }

    // TL -> BL -> BR -> TR turns the same way at every corner, with a
    // negative cross product in image coordinates.
    (0..4).all(|i| {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let c = quad[(i + 2) % 4];
        let (ab, bc) = (b - a, c - b);
        ab.x * bc.y - ab.y * bc.x < 0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeatureConfig;
    use crate::vision::test_support::{block_texture, framed_texture, BACKGROUND};
    use crate::vision::{BinaryDescriptor, KeyPoint};
    use approx::assert_abs_diff_eq;
    use image::Luma;

    fn single_level_config() -> DetectorConfig {
        let single = |max_features| FeatureConfig {
            levels: 1,
            max_features,
            ..FeatureConfig::default()
        };
        DetectorConfig {
            reference: single(1000),
            frame: single(2000),
            ..DetectorConfig::default()
        }
    }

    fn reference_image() -> GrayImage {
        framed_texture(160, 20, 8, 42)
    }

    /// Camera frame with the reference pasted at `(160, 120)` on a flat background.
    fn frame_with_landmark() -> GrayImage {
        let mut frame = GrayImage::from_pixel(640, 480, Luma([BACKGROUND]));
        image::imageops::replace(&mut frame, &reference_image(), 160, 120);
        frame
    }

    fn keypoint(x: f32, y: f32) -> KeyPoint {
        KeyPoint {
            x,
            y,
            response: 1.0,
            angle: 0.0,
            level: 0,
        }
    }

    /// Descriptor `i` differs from descriptor `j != i` in many bits.
    fn distinct_descriptor(i: usize) -> BinaryDescriptor {
        let word = (i as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        BinaryDescriptor([word, word.rotate_left(17), !word, word.rotate_right(29)])
    }

    fn flip_bits(d: BinaryDescriptor, n: u32) -> BinaryDescriptor {
        let mask = if n == 64 { u64::MAX } else { (1u64 << n) - 1 };
        BinaryDescriptor([d.0[0] ^ mask, d.0[1], d.0[2], d.0[3]])
    }

    /// Reference features on a 5x5 grid; the frame holds the same points shifted,
    /// with each descriptor corrupted by `noise_bits`.
    fn synthetic_pair(noise_bits: u32) -> (FeatureSet, FeatureSet) {
        let mut ref_kps = Vec::new();
        let mut ref_desc = Vec::new();
        let mut frame_kps = Vec::new();
        let mut frame_desc = Vec::new();
        for i in 0..25 {
            let (x, y) = ((i % 5) as f32 * 20.0 + 10.0, (i / 5) as f32 * 20.0 + 10.0);
            let d = distinct_descriptor(i);
            ref_kps.push(keypoint(x, y));
            ref_desc.push(d);
            frame_kps.push(keypoint(x + 200.0, y + 100.0));
            frame_desc.push(flip_bits(d, noise_bits));
        }
        (
            FeatureSet::new(ref_kps, ref_desc),
            FeatureSet::new(frame_kps, frame_desc),
        )
    }

    #[test]
    fn blank_reference_fails_initialization() {
        let blank = GrayImage::from_pixel(100, 100, Luma([200]));
        let err = LandmarkDetector::new(&blank, DetectorConfig::default()).err();
        assert!(matches!(err, Some(PerchError::Initialization(_))));
    }

    #[test]
    fn featureless_frame_is_a_miss_with_zero_confidence() {
        let detector = LandmarkDetector::new(&reference_image(), single_level_config()).unwrap();
        let blank = GrayImage::from_pixel(640, 480, Luma([BACKGROUND]));
        let detection = detector.detect(&blank);
        assert!(!detection.is_detected());
        assert_eq!(detection.confidence, 0.0);
    }

    #[test]
    fn unrelated_texture_is_not_detected() {
        let detector = LandmarkDetector::new(&reference_image(), single_level_config()).unwrap();
        let detection = detector.detect(&block_texture(640, 480, 8, 999));
        assert!(!detection.is_detected());
    }

    #[test]
    fn finds_pasted_landmark() {
        let detector = LandmarkDetector::new(&reference_image(), single_level_config()).unwrap();
        let detection = detector.detect(&frame_with_landmark());

        let result = detection.result.as_ref().expect("landmark should be detected");
        assert!(detection.good_matches >= 15);
        assert_abs_diff_eq!(result.confidence, 1.0, epsilon = 1e-9);
        // Reference corners span 0..=159, shifted by (160, 120).
        assert_abs_diff_eq!(result.center.x, 160.0 + 79.5, epsilon = 0.5);
        assert_abs_diff_eq!(result.center.y, 120.0 + 79.5, epsilon = 0.5);
        assert_abs_diff_eq!(result.quad[0].x, 160.0, epsilon = 0.5);
        assert_abs_diff_eq!(result.quad[2].y, 120.0 + 159.0, epsilon = 0.5);
        assert!(!result.correspondences.is_empty());
    }

    #[test]
    fn synthetic_features_confidence_follows_mean_distance() {
        let (reference, frame) = synthetic_pair(20);
        let detector =
            LandmarkDetector::from_features(reference, (100, 100), DetectorConfig::default())
                .unwrap();
        let detection = detector.detect_in(&frame, (640, 480));

        // Mean Hamming distance 20 -> confidence 0.8.
        assert_eq!(detection.good_matches, 25);
        assert_abs_diff_eq!(detection.confidence, 0.8, epsilon = 1e-9);
        let center = detection.center().unwrap();
        assert_abs_diff_eq!(center.x, 49.5 + 200.0, epsilon = 1e-6);
        assert_abs_diff_eq!(center.y, 49.5 + 100.0, epsilon = 1e-6);
    }

    #[test]
    fn low_confidence_is_reported_without_result() {
        let (reference, frame) = synthetic_pair(45);
        let detector =
            LandmarkDetector::from_features(reference, (100, 100), DetectorConfig::default())
                .unwrap();
        let detection = detector.detect_in(&frame, (640, 480));

        assert!(!detection.is_detected());
        assert_abs_diff_eq!(detection.confidence, 0.55, epsilon = 1e-9);
        assert!(detection.good_matches >= 15);
    }

    #[test]
    fn weakly_supported_homography_is_rejected() {
        let (reference, frame) = synthetic_pair(0);
        // Six correspondences keep the true shift; the rest land anywhere.
        let keypoints = frame
            .keypoints()
            .iter()
            .enumerate()
            .map(|(i, kp)| {
                if i < 6 {
                    *kp
                } else {
                    keypoint(((i * 173) % 600) as f32 + 5.0, ((i * 97) % 440) as f32 + 5.0)
                }
            })
            .collect();
        let scattered = FeatureSet::new(keypoints, frame.descriptors().to_vec());
        let detector =
            LandmarkDetector::from_features(reference, (100, 100), DetectorConfig::default())
                .unwrap();
        let detection = detector.detect_in(&scattered, (640, 480));

        assert!(!detection.is_detected());
        assert_eq!(detection.good_matches, 25);
        assert_abs_diff_eq!(detection.confidence, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn unrelated_textures_never_produce_a_detection() {
        let detector = LandmarkDetector::new(&reference_image(), single_level_config()).unwrap();
        for seed in 1..=5 {
            let detection = detector.detect(&block_texture(640, 480, 8, seed));
            assert!(!detection.is_detected(), "false detection for seed {seed}");
        }
    }

    #[test]
    fn quad_plausibility() {
        let p = Position2D::new;
        let square = [p(100.0, 100.0), p(100.0, 200.0), p(200.0, 200.0), p(200.0, 100.0)];
        assert!(is_plausible_quad(&square, (640, 480)));

        let bow_tie = [p(100.0, 100.0), p(200.0, 200.0), p(100.0, 200.0), p(200.0, 100.0)];
        assert!(!is_plausible_quad(&bow_tie, (640, 480)));

        let mirrored = [p(100.0, 100.0), p(200.0, 100.0), p(200.0, 200.0), p(100.0, 200.0)];
        assert!(!is_plausible_quad(&mirrored, (640, 480)));

        let far = [p(100.0, -1190.0), p(100.0, 200.0), p(1872.0, 200.0), p(200.0, 100.0)];
        assert!(!is_plausible_quad(&far, (640, 480)));
    }

    #[test]
    fn too_few_frame_features_is_a_miss() {
        let (reference, frame) = synthetic_pair(0);
        let few = FeatureSet::new(
            frame.keypoints()[..10].to_vec(),
            frame.descriptors()[..10].to_vec(),
        );
        let detector =
            LandmarkDetector::from_features(reference, (100, 100), DetectorConfig::default())
                .unwrap();
        assert_eq!(detector.detect_in(&few, (640, 480)), Detection::miss());
    }

    #[test]
    fn empty_reference_features_fail_initialization() {
        let result = LandmarkDetector::from_features(
            FeatureSet::default(),
            (10, 10),
            DetectorConfig::default(),
        );
        assert!(matches!(result, Err(PerchError::Initialization(_))));
    }
}
