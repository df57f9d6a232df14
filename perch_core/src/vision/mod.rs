// perch_core/src/vision/mod.rs

//! Low-level vision building blocks shared by the landmark detector and the
//! visual odometry estimator.

pub mod features;
pub mod homography;
pub mod matcher;

pub use features::{BinaryDescriptor, FeatureExtractor, FeatureSet, KeyPoint};
pub use homography::{Homography, RansacEstimator, RansacFit};
pub use matcher::{ratio_test, DescriptorMatch, DescriptorMatcher, KnnPair};
