//! Isolation-style distributional outlier scoring.
//!
//! A small forest of randomized binary split trees is fit on a metric's
//! window. Observations that isolate in few splits score close to 1;
//! observations deep inside the distribution score close to 0.5 or below.
//! The model is seeded, so fitting the same window twice produces the same
//! scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Maximum values sampled per tree.
const SUBSAMPLE: usize = 256;

/// One randomized isolation tree over scalar values.
#[derive(Debug, Clone)]
enum IsolationNode {
    /// Internal split at a threshold.
    Split {
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Leaf holding the number of values that ended here.
    Leaf { size: usize },
}

impl IsolationNode {
    fn build(values: &mut [f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Self {
        if values.len() <= 1 || depth >= max_depth {
            return Self::Leaf { size: values.len() };
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if (max - min).abs() < f64::EPSILON {
            return Self::Leaf { size: values.len() };
        }

        let threshold = rng.gen_range(min..max);
        let split = partition_in_place(values, threshold);
        let (left_vals, right_vals) = values.split_at_mut(split);

        Self::Split {
            threshold,
            left: Box::new(Self::build(left_vals, depth + 1, max_depth, rng)),
            right: Box::new(Self::build(right_vals, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, value: f64, depth: usize) -> f64 {
        match self {
            Self::Split {
                threshold,
                left,
                right,
            } => {
                if value < *threshold {
                    left.path_length(value, depth + 1)
                } else {
                    right.path_length(value, depth + 1)
                }
            }
            Self::Leaf { size } => depth as f64 + average_path_length(*size),
        }
    }
}

/// Partitions a slice in place around a threshold, returning the split index.
fn partition_in_place(values: &mut [f64], threshold: f64) -> usize {
    let mut split = 0;
    for i in 0..values.len() {
        if values[i] < threshold {
            values.swap(i, split);
            split += 1;
        }
    }
    split
}

/// Expected path length of an unsuccessful BST search over `n` values.
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    // Harmonic number approximation H(n-1) ≈ ln(n-1) + Euler–Mascheroni.
    2.0 * ((n - 1.0).ln() + 0.577_215_664_901_532_9) - 2.0 * (n - 1.0) / n
}

/// A fitted outlier model for one metric window.
#[derive(Debug, Clone)]
pub struct OutlierModel {
    trees: Vec<IsolationNode>,
    sample_size: usize,
}

impl OutlierModel {
    /// Fits a model on a window of values.
    ///
    /// Returns `None` when the window is too small to say anything useful
    /// (fewer than 20 values).
    #[must_use]
    pub fn fit(values: &[f64], tree_count: usize, seed: u64) -> Option<Self> {
        if values.len() < 20 || tree_count == 0 {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let sample_size = values.len().min(SUBSAMPLE);
        let max_depth = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..tree_count)
            .map(|_| {
                let mut sample: Vec<f64> = if values.len() <= SUBSAMPLE {
                    values.to_vec()
                } else {
                    (0..SUBSAMPLE)
                        .map(|_| values[rng.gen_range(0..values.len())])
                        .collect()
                };
                IsolationNode::build(&mut sample, 0, max_depth, &mut rng)
            })
            .collect();

        Some(Self { trees, sample_size })
    }

    /// Scores an observation in `[0, 1]`; higher means more anomalous.
    #[must_use]
    pub fn score(&self, value: f64) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }

        let total: f64 = self
            .trees
            .iter()
            .map(|t| t.path_length(value, 0))
            .sum();
        let mean_path = total / self.trees.len() as f64;
        let normalizer = average_path_length(self.sample_size).max(f64::EPSILON);

        2.0_f64.powf(-mean_path / normalizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tight_window() -> Vec<f64> {
        // 100 values clustered around 50.
        (0..100).map(|i| 50.0 + f64::from(i % 10) * 0.1).collect()
    }

    #[test]
    fn refuses_small_windows() {
        assert!(OutlierModel::fit(&[1.0, 2.0, 3.0], 32, 42).is_none());
    }

    #[test]
    fn far_value_scores_higher_than_central_value() {
        let window = tight_window();
        let model = OutlierModel::fit(&window, 64, 42)
            .unwrap_or_else(|| panic!("model should fit"));

        let central = model.score(50.4);
        let distant = model.score(500.0);

        assert!(distant > central);
        assert!(distant > 0.6, "distant score was {distant}");
    }

    #[test]
    fn scoring_is_deterministic_for_same_seed() {
        let window = tight_window();
        let a = OutlierModel::fit(&window, 64, 42)
            .unwrap_or_else(|| panic!("model should fit"));
        let b = OutlierModel::fit(&window, 64, 42)
            .unwrap_or_else(|| panic!("model should fit"));

        assert!((a.score(75.0) - b.score(75.0)).abs() < 1e-12);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let window = tight_window();
        let model = OutlierModel::fit(&window, 64, 7)
            .unwrap_or_else(|| panic!("model should fit"));

        for value in [-1000.0, 0.0, 50.0, 55.0, 1000.0] {
            let score = model.score(value);
            assert!((0.0..=1.0).contains(&score), "score {score} for {value}");
        }
    }
}
