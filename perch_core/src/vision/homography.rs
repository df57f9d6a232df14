// perch_core/src/vision/homography.rs

//! Planar homography estimation: normalized DLT plus a RANSAC wrapper.

use crate::config::RansacConfig;
use nalgebra::{DMatrix, Matrix3, Point2, Vector2, Vector3};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::f64::consts::SQRT_2;

/// A homography needs four correspondences.
pub const MIN_CORRESPONDENCES: usize = 4;

const SINGULAR_EPS: f64 = 1e-12;
/// Twice the triangle area below which three sample points count as collinear.
const COLLINEAR_EPS: f64 = 1e-6;

/// A projective transform of the plane, normalized so that `H[(2, 2)] == 1`
/// whenever that entry is non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    /// Wraps a matrix, rejecting non-finite or singular ones.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Option<Self> {
        if !matrix.iter().all(|v| v.is_finite()) {
            return None;
        }
        let scale = matrix[(2, 2)];
        let matrix = if scale.abs() > SINGULAR_EPS {
            matrix / scale
        } else {
            matrix
        };
        if matrix.determinant().abs() < SINGULAR_EPS {
            return None;
        }
        Some(Self(matrix))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// The translation column `(H[(0, 2)], H[(1, 2)])`.
    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.0[(0, 2)], self.0[(1, 2)])
    }

    /// Maps a point through the homography. `None` if it lands on the line at infinity.
    pub fn project(&self, point: &Point2<f64>) -> Option<Point2<f64>> {
        let p = self.0 * Vector3::new(point.x, point.y, 1.0);
        if p.z.abs() < SINGULAR_EPS {
            return None;
        }
        Some(Point2::new(p.x / p.z, p.y / p.z))
    }

    /// Least-squares fit mapping `src[i]` onto `dst[i]` (normalized DLT).
    pub fn fit(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Self> {
        if src.len() != dst.len() || src.len() < MIN_CORRESPONDENCES {
            return None;
        }
        let (t_src, src_n) = normalize(src)?;
        let (t_dst, dst_n) = normalize(dst)?;

        // Accumulate AᵀA directly; its eigenvector with the smallest eigenvalue
        // is the DLT solution, also when A has fewer rows than columns.
        let mut ata = DMatrix::<f64>::zeros(9, 9);
        for (p, q) in src_n.iter().zip(&dst_n) {
            let (x, y, u, v) = (p.x, p.y, q.x, q.y);
            let rows = [
                [-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u],
                [0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v],
            ];
            for row in &rows {
                for i in 0..9 {
                    for j in 0..9 {
                        ata[(i, j)] += row[i] * row[j];
                    }
                }
            }
        }

        let eigen = ata.symmetric_eigen();
        let (min_idx, _) = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))?;
        let h = eigen.eigenvectors.column(min_idx);
        let normalized = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

        let denormalized = t_dst.try_inverse()? * normalized * t_src;
        Self::from_matrix(denormalized)
    }

    /// Marks each correspondence whose reprojection error is within `threshold_sq` (squared pixels).
    pub fn inlier_mask(&self, src: &[Point2<f64>], dst: &[Point2<f64>], threshold_sq: f64) -> Vec<bool> {
        src.iter()
            .zip(dst)
            .map(|(s, d)| {
                self.project(s)
                    .map_or(false, |p| (p - d).norm_squared() <= threshold_sq)
            })
            .collect()
    }
}

/// Hartley normalization: centroid to the origin, mean distance `sqrt(2)`.
fn normalize(points: &[Point2<f64>]) -> Option<(Matrix3<f64>, Vec<Point2<f64>>)> {
    let n = points.len() as f64;
    let centroid = points
        .iter()
        .fold(Vector2::zeros(), |acc: Vector2<f64>, p| acc + p.coords)
        / n;
    let mean_distance = points
        .iter()
        .map(|p| (p.coords - centroid).norm())
        .sum::<f64>()
        / n;
    if mean_distance < f64::EPSILON {
        return None;
    }

    let s = SQRT_2 / mean_distance;
    let transform = Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    );
    let normalized = points
        .iter()
        .map(|p| Point2::from((p.coords - centroid) * s))
        .collect();
    Some((transform, normalized))
}

/// True if any three of the four points are (nearly) collinear.
fn is_degenerate(points: &[Point2<f64>; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES.iter().any(|&(a, b, c)| {
        let ab = points[b] - points[a];
        let ac = points[c] - points[a];
        (ab.x * ac.y - ab.y * ac.x).abs() < COLLINEAR_EPS
    })
}

/// Result of a robust fit.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacFit {
    pub homography: Homography,
    /// One flag per input correspondence.
    pub inliers: Vec<bool>,
}

impl RansacFit {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&inlier| inlier).count()
    }
}

/// Random-sample-consensus homography estimation.
///
/// Sampling uses a `ChaCha8Rng` re-seeded on every call, so the same
/// correspondences always produce the same fit.
#[derive(Debug, Clone)]
pub struct RansacEstimator {
    config: RansacConfig,
}

impl RansacEstimator {
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }

    /// Returns `None` for fewer than four correspondences, when every sample is
    /// degenerate, or when no hypothesis gathers four inliers.
    pub fn estimate(&self, src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<RansacFit> {
        let n = src.len();
        if n != dst.len() || n < MIN_CORRESPONDENCES {
            return None;
        }
        let threshold_sq = self.config.inlier_threshold * self.config.inlier_threshold;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let iterations = if n == MIN_CORRESPONDENCES {
            1
        } else {
            self.config.max_iterations.max(1)
        };

        let mut best: Option<(Homography, Vec<bool>, usize)> = None;
        for _ in 0..iterations {
            let sample: [usize; 4] = if n == MIN_CORRESPONDENCES {
                [0, 1, 2, 3]
            } else {
                let picked = index::sample(&mut rng, n, MIN_CORRESPONDENCES);
                [picked.index(0), picked.index(1), picked.index(2), picked.index(3)]
            };
            let sample_src = sample.map(|i| src[i]);
            let sample_dst = sample.map(|i| dst[i]);
            if is_degenerate(&sample_src) || is_degenerate(&sample_dst) {
                continue;
            }
            let Some(candidate) = Homography::fit(&sample_src, &sample_dst) else {
                continue;
            };

            let mask = candidate.inlier_mask(src, dst, threshold_sq);
            let count = mask.iter().filter(|&&inlier| inlier).count();
            if best.as_ref().map_or(true, |(_, _, c)| count > *c) {
                best = Some((candidate, mask, count));
                if count == n {
                    break;
                }
            }
        }

        let (model, mask, count) = best?;
        if count < MIN_CORRESPONDENCES {
            return None;
        }

        // Refit on the consensus set; keep the refit only if it does not lose support.
        let (consensus_src, consensus_dst): (Vec<Point2<f64>>, Vec<Point2<f64>>) = src
            .iter()
            .zip(dst)
            .zip(&mask)
            .filter(|(_, inlier)| **inlier)
            .map(|((s, d), _)| (*s, *d))
            .unzip();
        if let Some(refined) = Homography::fit(&consensus_src, &consensus_dst) {
            let refined_mask = refined.inlier_mask(src, dst, threshold_sq);
            if refined_mask.iter().filter(|&&inlier| inlier).count() >= count {
                return Some(RansacFit {
                    homography: refined,
                    inliers: refined_mask,
                });
            }
        }
        Some(RansacFit {
            homography: model,
            inliers: mask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid() -> Vec<Point2<f64>> {
        (0..6)
            .flat_map(|i| (0..5).map(move |j| Point2::new(20.0 * i as f64 + 3.0, 17.0 * j as f64 + 5.0)))
            .collect()
    }

    fn perspective() -> Homography {
        Homography::from_matrix(Matrix3::new(
            1.1, 0.05, 30.0, //
            -0.04, 0.95, -12.0, //
            0.0004, -0.0002, 1.0,
        ))
        .unwrap()
    }

    #[test]
    fn fit_recovers_pure_translation() {
        let src = grid();
        let dst: Vec<_> = src.iter().map(|p| p + Vector2::new(16.0, -4.0)).collect();
        let h = Homography::fit(&src, &dst).unwrap();
        let t = h.translation();
        assert_abs_diff_eq!(t.x, 16.0, epsilon = 1e-6);
        assert_abs_diff_eq!(t.y, -4.0, epsilon = 1e-6);
    }

    #[test]
    fn fit_recovers_perspective_transform() {
        let truth = perspective();
        let src = grid();
        let dst: Vec<_> = src.iter().map(|p| truth.project(p).unwrap()).collect();
        let h = Homography::fit(&src, &dst).unwrap();
        for (a, b) in h.matrix().iter().zip(truth.matrix().iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn fit_needs_four_points() {
        let src = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0)];
        assert!(Homography::fit(&src, &src).is_none());
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let src: Vec<_> = (0..10).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
        let dst: Vec<_> = src.iter().map(|p| p + Vector2::new(5.0, 5.0)).collect();
        let estimator = RansacEstimator::new(RansacConfig::default());
        assert!(estimator.estimate(&src, &dst).is_none());
    }

    #[test]
    fn ransac_ignores_outliers() {
        let truth = perspective();
        let src = grid();
        let mut dst: Vec<_> = src.iter().map(|p| truth.project(p).unwrap()).collect();
        // Corrupt every third correspondence by a large offset.
        for (i, p) in dst.iter_mut().enumerate() {
            if i % 3 == 0 {
                *p += Vector2::new(40.0 + i as f64, -35.0);
            }
        }

        let fit = RansacEstimator::new(RansacConfig::default())
            .estimate(&src, &dst)
            .unwrap();
        assert_eq!(fit.inlier_count(), src.len() - src.len().div_ceil(3));
        for (i, inlier) in fit.inliers.iter().enumerate() {
            assert_eq!(*inlier, i % 3 != 0);
        }
        let corner = fit.homography.project(&Point2::new(0.0, 0.0)).unwrap();
        let expected = truth.project(&Point2::new(0.0, 0.0)).unwrap();
        assert_abs_diff_eq!(corner.x, expected.x, epsilon = 1e-3);
        assert_abs_diff_eq!(corner.y, expected.y, epsilon = 1e-3);
    }

    #[test]
    fn ransac_is_deterministic() {
        let src = grid();
        let dst: Vec<_> = src
            .iter()
            .enumerate()
            .map(|(i, p)| p + Vector2::new(3.0, 1.0 + (i % 4) as f64 * 0.5))
            .collect();
        let estimator = RansacEstimator::new(RansacConfig::default());
        assert_eq!(estimator.estimate(&src, &dst), estimator.estimate(&src, &dst));
    }

    #[test]
    fn singular_matrix_is_rejected() {
        assert!(Homography::from_matrix(Matrix3::zeros()).is_none());
        assert!(Homography::from_matrix(Matrix3::from_element(f64::NAN)).is_none());
    }
}
