// perch_core/src/vision/features.rs

//! Oriented binary features for landmark matching and frame-to-frame tracking.
//!
//! Corners come from FAST-9 on a small image pyramid and are ranked by Harris
//! response with one survivor per grid cell. Each survivor gets an orientation
//! from the intensity centroid of its patch and a 256-bit BRIEF descriptor whose
//! sampling pattern is rotated by that orientation.

use crate::config::FeatureConfig;
use image::{imageops, GrayImage};
use nalgebra::Point2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Radius of the orientation/descriptor patch.
const PATCH_RADIUS: i32 = 15;
/// Keypoints closer than this to the border are never produced.
const BORDER: i32 = PATCH_RADIUS + 1;
/// Largest pattern offset on either axis. Rotated samples stay within `PATCH_RADIUS`.
const PATTERN_EXTENT: i32 = 10;
const PATTERN_BITS: usize = 256;
const PATTERN_SEED: u64 = 0x0B12_1EF5;
const HARRIS_K: f32 = 0.04;
const HARRIS_HALF_WINDOW: i32 = 3;
const DESCRIPTOR_BLUR_SIGMA: f32 = 1.2;
/// Pyramid levels smaller than this are skipped.
const MIN_LEVEL_SIZE: u32 = 2 * BORDER as u32 + 1;

/// Bresenham circle of radius 3, clockwise from 12 o'clock.
const FAST_RING: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];
const FAST_ARC: usize = 9;

/// A detected corner, in level-0 (full resolution) pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    /// Harris response at the level it was detected on.
    pub response: f32,
    /// Patch orientation in radians.
    pub angle: f32,
    /// Pyramid level the corner was found on.
    pub level: u8,
}

impl KeyPoint {
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x as f64, self.y as f64)
    }
}

/// 256-bit binary descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BinaryDescriptor(pub [u64; 4]);

impl BinaryDescriptor {
    /// Number of differing bits, 0..=256.
    pub fn hamming(&self, other: &Self) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// Keypoints paired index-for-index with their descriptors.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    keypoints: Vec<KeyPoint>,
    descriptors: Vec<BinaryDescriptor>,
}

impl FeatureSet {
    pub fn new(keypoints: Vec<KeyPoint>, descriptors: Vec<BinaryDescriptor>) -> Self {
        assert_eq!(
            keypoints.len(),
            descriptors.len(),
            "every keypoint needs exactly one descriptor"
        );
        Self {
            keypoints,
            descriptors,
        }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    pub fn keypoints(&self) -> &[KeyPoint] {
        &self.keypoints
    }

    pub fn descriptors(&self) -> &[BinaryDescriptor] {
        &self.descriptors
    }

    pub fn point(&self, idx: usize) -> Point2<f64> {
        self.keypoints[idx].position()
    }
}

/// Detects and describes features with a fixed, deterministic cost bound.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    /// Point pairs `(x1, y1, x2, y2)` compared for each descriptor bit.
    pattern: Vec<(i8, i8, i8, i8)>,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            pattern: sampling_pattern(),
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extracts at most `max_features` features, strongest first.
    pub fn extract(&self, image: &GrayImage) -> FeatureSet {
        let mut features: Vec<(KeyPoint, BinaryDescriptor)> = Vec::new();
        let mut scaled: Option<GrayImage> = None;
        let mut scale = 1.0_f64;

        for level in 0..self.config.levels {
            if level > 0 {
                scale *= self.config.scale_factor;
                let width = (image.width() as f64 / scale).round() as u32;
                let height = (image.height() as f64 / scale).round() as u32;
                if width < MIN_LEVEL_SIZE || height < MIN_LEVEL_SIZE {
                    break;
                }
                scaled = Some(imageops::resize(
                    image,
                    width,
                    height,
                    imageops::FilterType::Triangle,
                ));
            }
            let level_image = scaled.as_ref().unwrap_or(image);
            self.extract_level(level_image, level as u8, scale as f32, &mut features);
        }

        // Stable sort keeps raster order among equal responses.
        features.sort_by(|a, b| b.0.response.total_cmp(&a.0.response));
        features.truncate(self.config.max_features);

        let (keypoints, descriptors) = features.into_iter().unzip();
        FeatureSet {
            keypoints,
            descriptors,
        }
    }

    fn extract_level(
        &self,
        image: &GrayImage,
        level: u8,
        scale: f32,
        out: &mut Vec<(KeyPoint, BinaryDescriptor)>,
    ) {
        let (width, height) = image.dimensions();
        if width < MIN_LEVEL_SIZE || height < MIN_LEVEL_SIZE {
            return;
        }
        let stride = width as i32;
        let data = image.as_raw();

        // One candidate per grid cell: the strongest Harris response wins.
        let cell = self.config.nms_cell;
        let cols = (width as usize).div_ceil(cell);
        let rows = (height as usize).div_ceil(cell);
        let mut grid: Vec<Option<(i32, i32, f32)>> = vec![None; cols * rows];

        for y in BORDER..(height as i32 - BORDER) {
            for x in BORDER..(stride - BORDER) {
                if !is_fast_corner(data, stride, x, y, self.config.fast_threshold) {
                    continue;
                }
                let response = harris_response(data, stride, x, y);
                let slot = &mut grid[(y as usize / cell) * cols + x as usize / cell];
                let replace = match slot {
                    Some((_, _, best)) => response > *best,
                    None => true,
                };
                if replace {
                    *slot = Some((x, y, response));
                }
            }
        }

        let smoothed = imageops::blur(image, DESCRIPTOR_BLUR_SIGMA);
        for (x, y, response) in grid.into_iter().flatten() {
            let angle = centroid_angle(data, stride, x, y);
            let descriptor = self.describe(&smoothed, x, y, angle);
            let keypoint = KeyPoint {
                x: x as f32 * scale,
                y: y as f32 * scale,
                response,
                angle,
                level,
            };
            out.push((keypoint, descriptor));
        }
    }

    fn describe(&self, smoothed: &GrayImage, x: i32, y: i32, angle: f32) -> BinaryDescriptor {
        let (sin_a, cos_a) = angle.sin_cos();
        let stride = smoothed.width() as i32;
        let data = smoothed.as_raw();
        let sample = |dx: i8, dy: i8| -> u8 {
            let (dx, dy) = (dx as f32, dy as f32);
            let px = x + (dx * cos_a - dy * sin_a).round() as i32;
            let py = y + (dx * sin_a + dy * cos_a).round() as i32;
            data[(py * stride + px) as usize]
        };

        let mut bits = [0u64; 4];
        for (i, &(x1, y1, x2, y2)) in self.pattern.iter().enumerate() {
            if sample(x1, y1) < sample(x2, y2) {
                bits[i / 64] |= 1u64 << (i % 64);
            }
        }
        BinaryDescriptor(bits)
    }
}

/// The BRIEF test pairs. Generated from a fixed seed, so descriptors are
/// comparable across extractors and runs.
fn sampling_pattern() -> Vec<(i8, i8, i8, i8)> {
    let mut rng = ChaCha8Rng::seed_from_u64(PATTERN_SEED);
    let mut pattern = Vec::with_capacity(PATTERN_BITS);
    while pattern.len() < PATTERN_BITS {
        let mut coord = || rng.gen_range(-PATTERN_EXTENT..=PATTERN_EXTENT) as i8;
        let pair = (coord(), coord(), coord(), coord());
        if (pair.0, pair.1) != (pair.2, pair.3) {
            pattern.push(pair);
        }
    }
    pattern
}

// --- Pixel kernels ---
// All of these index the raw buffer directly. Callers guarantee (x, y) lies at
// least `BORDER` pixels inside the image.

#[inline]
fn pixel(data: &[u8], stride: i32, x: i32, y: i32) -> i16 {
    data[(y * stride + x) as usize] as i16
}

fn is_fast_corner(data: &[u8], stride: i32, x: i32, y: i32, threshold: u8) -> bool {
    let center = pixel(data, stride, x, y);
    let t = threshold as i16;
    let brighter = |p: i16| p > center + t;
    let darker = |p: i16| p < center - t;

    // Any 9-pixel arc covers at least two of the four compass points.
    let compass = [
        pixel(data, stride, x, y - 3),
        pixel(data, stride, x + 3, y),
        pixel(data, stride, x, y + 3),
        pixel(data, stride, x - 3, y),
    ];
    let bright_hits = compass.iter().filter(|&&p| brighter(p)).count();
    let dark_hits = compass.iter().filter(|&&p| darker(p)).count();
    if bright_hits < 2 && dark_hits < 2 {
        return false;
    }

    let ring: [i16; 16] =
        std::array::from_fn(|i| pixel(data, stride, x + FAST_RING[i].0, y + FAST_RING[i].1));
    longest_arc(&ring, brighter) >= FAST_ARC || longest_arc(&ring, darker) >= FAST_ARC
}

/// Longest run of consecutive ring pixels satisfying `pred`, wrapping around.
fn longest_arc(ring: &[i16; 16], pred: impl Fn(i16) -> bool) -> usize {
    let mut run = 0;
    let mut longest = 0;
    for i in 0..2 * ring.len() {
        if pred(ring[i % ring.len()]) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest.min(ring.len())
}

/// `det(M) - k * trace(M)^2` of the structure tensor over a 7x7 window.
fn harris_response(data: &[u8], stride: i32, x: i32, y: i32) -> f32 {
    let mut sxx = 0.0_f32;
    let mut syy = 0.0_f32;
    let mut sxy = 0.0_f32;
    for v in (y - HARRIS_HALF_WINDOW)..=(y + HARRIS_HALF_WINDOW) {
        for u in (x - HARRIS_HALF_WINDOW)..=(x + HARRIS_HALF_WINDOW) {
            let gx = (pixel(data, stride, u + 1, v) - pixel(data, stride, u - 1, v)) as f32 * 0.5;
            let gy = (pixel(data, stride, u, v + 1) - pixel(data, stride, u, v - 1)) as f32 * 0.5;
            sxx += gx * gx;
            syy += gy * gy;
            sxy += gx * gy;
        }
    }
    let trace = sxx + syy;
    sxx * syy - sxy * sxy - HARRIS_K * trace * trace
}

/// Orientation of the vector from the patch center to its intensity centroid.
fn centroid_angle(data: &[u8], stride: i32, x: i32, y: i32) -> f32 {
    let r2 = PATCH_RADIUS * PATCH_RADIUS;
    let mut m10 = 0.0_f32;
    let mut m01 = 0.0_f32;
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        for dx in -PATCH_RADIUS..=PATCH_RADIUS {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let intensity = pixel(data, stride, x + dx, y + dy) as f32;
            m10 += dx as f32 * intensity;
            m01 += dy as f32 * intensity;
        }
    }
    m01.atan2(m10)
}
