// perch_core/src/vision/matcher.rs

use crate::vision::features::BinaryDescriptor;

/// A query descriptor paired with a train descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    /// Hamming distance, 0..=256.
    pub distance: u32,
}

/// The two nearest train descriptors for one query descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnnPair {
    pub best: DescriptorMatch,
    /// Absent when the train set holds a single descriptor.
    pub second: Option<DescriptorMatch>,
}

/// Exhaustive Hamming matcher. Cost is `query.len() * train.len()`, which the
/// extractors' feature caps bound per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorMatcher;

impl DescriptorMatcher {
    /// Finds the two nearest train descriptors for every query descriptor.
    ///
    /// Returns `None` when either side is empty; there is nothing to match and
    /// callers treat it the same as a failed match.
    pub fn knn2(
        &self,
        query: &[BinaryDescriptor],
        train: &[BinaryDescriptor],
    ) -> Option<Vec<KnnPair>> {
        if query.is_empty() || train.is_empty() {
            return None;
        }

        let pairs = query
            .iter()
            .enumerate()
            .map(|(query_idx, q)| {
                let mut best: Option<DescriptorMatch> = None;
                let mut second: Option<DescriptorMatch> = None;
                for (train_idx, t) in train.iter().enumerate() {
                    let candidate = DescriptorMatch {
                        query_idx,
                        train_idx,
                        distance: q.hamming(t),
                    };
                    match best {
                        Some(b) if candidate.distance >= b.distance => {
                            if second.map_or(true, |s| candidate.distance < s.distance) {
                                second = Some(candidate);
                            }
                        }
                        _ => {
                            second = best;
                            best = Some(candidate);
                        }
                    }
                }
                KnnPair {
                    // `train` is non-empty, so the first iteration always sets `best`.
                    best: best.unwrap_or(DescriptorMatch {
                        query_idx,
                        train_idx: 0,
                        distance: u32::MAX,
                    }),
                    second,
                }
            })
            .collect();
        Some(pairs)
    }

    /// `knn2` followed by [`ratio_test`].
    pub fn ratio_matches(
        &self,
        query: &[BinaryDescriptor],
        train: &[BinaryDescriptor],
        ratio: f64,
    ) -> Option<Vec<DescriptorMatch>> {
        self.knn2(query, train).map(|pairs| ratio_test(&pairs, ratio))
    }
}

/// Keeps the best match of each pair when it is clearly better than the runner-up:
/// `best < ratio * second`. Pairs without a runner-up are dropped.
pub fn ratio_test(pairs: &[KnnPair], ratio: f64) -> Vec<DescriptorMatch> {
    pairs
        .iter()
        .filter_map(|pair| {
            let second = pair.second?;
            ((pair.best.distance as f64) < ratio * second.distance as f64).then_some(pair.best)
        })
        .collect()
}
