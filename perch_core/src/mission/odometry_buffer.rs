// perch_core/src/mission/odometry_buffer.rs

use crate::perception::OdometryResult;
use nalgebra::Vector2;
use std::collections::VecDeque;

/// Rolling window of accepted odometry samples; the oldest is evicted first.
#[derive(Debug, Clone)]
pub struct OdometryBuffer {
    samples: VecDeque<OdometryResult>,
    capacity: usize,
}

impl OdometryBuffer {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: OdometryResult) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&OdometryResult> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OdometryResult> {
        self.samples.iter()
    }

    /// Sum of the buffered displacements, in image pixels.
    pub fn cumulative(&self) -> Vector2<f64> {
        self.samples
            .iter()
            .fold(Vector2::zeros(), |acc, s| acc + s.displacement())
    }

    /// Mean confidence of the buffered samples, 0 when empty.
    pub fn mean_confidence(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.confidence).sum::<f64>() / self.samples.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::OdometryMethod;
    use approx::assert_abs_diff_eq;

    fn sample(dx: f64, confidence: f64) -> OdometryResult {
        OdometryResult {
            dx,
            dy: -dx,
            confidence,
            matches: 50,
            method: OdometryMethod::Homography,
        }
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let mut buffer = OdometryBuffer::new(3);
        for dx in 1..=5 {
            buffer.push(sample(dx as f64, 0.5));
        }
        assert_eq!(buffer.len(), 3);
        let kept: Vec<f64> = buffer.iter().map(|s| s.dx).collect();
        assert_eq!(kept, vec![3.0, 4.0, 5.0]);
        assert_eq!(buffer.latest().map(|s| s.dx), Some(5.0));
    }

    #[test]
    fn cumulative_sums_displacements() {
        let mut buffer = OdometryBuffer::new(10);
        buffer.push(sample(2.0, 0.4));
        buffer.push(sample(3.0, 0.8));
        let total = buffer.cumulative();
        assert_abs_diff_eq!(total.x, 5.0);
        assert_abs_diff_eq!(total.y, -5.0);
        assert_abs_diff_eq!(buffer.mean_confidence(), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn clear_empties_the_window() {
        let mut buffer = OdometryBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
        buffer.push(sample(1.0, 1.0));
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.cumulative(), Vector2::zeros());
        assert_eq!(buffer.mean_confidence(), 0.0);
    }
}
