//! Baseline statistics types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling statistical baseline for one named metric.
///
/// A baseline is only produced once its window holds at least the
/// configured minimum number of samples; consumers never see statistics
/// derived from insufficient data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBaseline {
    /// The metric this baseline describes.
    pub metric_name: String,
    /// Arithmetic mean over the window.
    pub mean: f64,
    /// Sample standard deviation over the window.
    pub std_dev: f64,
    /// 95th percentile (linear interpolation).
    pub p95: f64,
    /// 99th percentile (linear interpolation).
    pub p99: f64,
    /// Smallest value in the window.
    pub min_value: f64,
    /// Largest value in the window.
    pub max_value: f64,
    /// Number of samples in the window.
    pub sample_count: usize,
    /// 95% confidence interval for the mean (Student's t, n-1 df).
    pub confidence_interval: (f64, f64),
    /// Exponentially weighted mean (drift-sensitive).
    pub ewma_mean: f64,
    /// Exponentially weighted standard deviation.
    pub ewma_std_dev: f64,
    /// When the baseline was last recomputed.
    pub last_updated: DateTime<Utc>,
}

impl PerformanceBaseline {
    /// Returns the z-score of a value against the window mean.
    ///
    /// A zero standard deviation yields 0; callers apply the minimum
    /// absolute delta rule in that case.
    #[must_use]
    pub fn z_score(&self, value: f64) -> f64 {
        if self.std_dev > 0.0 {
            (value - self.mean) / self.std_dev
        } else {
            0.0
        }
    }

    /// Returns the percent deviation of a value from the window mean.
    #[must_use]
    pub fn deviation_percent(&self, value: f64) -> f64 {
        if self.mean.abs() > f64::EPSILON {
            (value - self.mean).abs() / self.mean.abs() * 100.0
        } else {
            0.0
        }
    }
}

/// Configuration for the baseline store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Samples older than this many hours are dropped from the window.
    pub window_hours: i64,
    /// Minimum samples required before a baseline is exposed.
    pub minimum_samples: usize,
    /// Hard cap on window size.
    pub max_window_samples: usize,
    /// EWMA learning rate.
    pub ewma_alpha: f64,
    /// Minimum absolute delta treated as significant when the window has
    /// no variation (std dev of zero).
    pub minimum_absolute_delta: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            minimum_samples: 50,
            max_window_samples: 1000,
            ewma_alpha: 0.1,
            minimum_absolute_delta: 1e-6,
        }
    }
}

impl BaselineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the window length in hours.
    #[must_use]
    pub const fn with_window_hours(mut self, hours: i64) -> Self {
        self.window_hours = hours;
        self
    }

    /// Sets the minimum sample count.
    #[must_use]
    pub const fn with_minimum_samples(mut self, samples: usize) -> Self {
        self.minimum_samples = samples;
        self
    }

    /// Sets the maximum window size.
    #[must_use]
    pub const fn with_max_window_samples(mut self, samples: usize) -> Self {
        self.max_window_samples = samples;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline(mean: f64, std_dev: f64) -> PerformanceBaseline {
        PerformanceBaseline {
            metric_name: "api_response_time_ms".to_string(),
            mean,
            std_dev,
            p95: mean + 2.0 * std_dev,
            p99: mean + 3.0 * std_dev,
            min_value: mean - std_dev,
            max_value: mean + std_dev,
            sample_count: 100,
            confidence_interval: (mean - 1.0, mean + 1.0),
            ewma_mean: mean,
            ewma_std_dev: std_dev,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn z_score_measures_deviation_in_sigmas() {
        let b = baseline(100.0, 10.0);
        assert!((b.z_score(120.0) - 2.0).abs() < 1e-9);
        assert!((b.z_score(80.0) + 2.0).abs() < 1e-9);
    }

    #[test]
    fn z_score_is_zero_without_variation() {
        let b = baseline(100.0, 0.0);
        assert!((b.z_score(150.0)).abs() < 1e-9);
    }

    #[test]
    fn deviation_percent_is_relative_to_mean() {
        let b = baseline(200.0, 5.0);
        assert!((b.deviation_percent(220.0) - 10.0).abs() < 1e-9);
        assert!((b.deviation_percent(180.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn default_config_matches_platform_defaults() {
        let config = BaselineConfig::default();
        assert_eq!(config.window_hours, 24);
        assert_eq!(config.minimum_samples, 50);
        assert_eq!(config.max_window_samples, 1000);
        assert!((config.ewma_alpha - 0.1).abs() < f64::EPSILON);
    }
}
