//! Thread-safe baseline storage.
//!
//! The [`BaselineStore`] keeps a bounded sliding window of samples per
//! metric and derives the statistics the regression detector and impact
//! assessor compare against. Windows are pruned by age on every insert;
//! each metric owns its lock so concurrent recorders do not contend across
//! metrics.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use crate::types::{BaselineConfig, PerformanceBaseline};

/// One recorded observation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    value: f64,
    timestamp: DateTime<Utc>,
}

/// Per-metric window with incremental EWMA state.
#[derive(Debug, Default)]
struct MetricWindow {
    samples: VecDeque<Sample>,
    ewma_mean: f64,
    ewma_var: f64,
    ewma_initialized: bool,
}

impl MetricWindow {
    fn record(&mut self, value: f64, timestamp: DateTime<Utc>, config: &BaselineConfig) {
        let cutoff = Utc::now() - Duration::hours(config.window_hours);
        while self
            .samples
            .front()
            .is_some_and(|s| s.timestamp < cutoff)
        {
            self.samples.pop_front();
        }

        self.samples.push_back(Sample { value, timestamp });
        while self.samples.len() > config.max_window_samples {
            self.samples.pop_front();
        }

        if self.ewma_initialized {
            let diff = value - self.ewma_mean;
            let incr = config.ewma_alpha * diff;
            self.ewma_mean += incr;
            self.ewma_var = (1.0 - config.ewma_alpha) * (self.ewma_var + diff * incr);
        } else {
            self.ewma_mean = value;
            self.ewma_var = 0.0;
            self.ewma_initialized = true;
        }
    }

    fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }
}

/// Shared store of per-metric performance baselines.
///
/// Cloning the store produces a handle to the same underlying windows.
#[derive(Debug)]
pub struct BaselineStore {
    config: BaselineConfig,
    windows: Arc<RwLock<HashMap<String, Arc<Mutex<MetricWindow>>>>>,
}

impl BaselineStore {
    /// Creates a store with the given configuration.
    #[must_use]
    pub fn new(config: BaselineConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Records one sample for a metric.
    ///
    /// Samples older than the configured window are dropped; the window is
    /// capped at `max_window_samples`.
    pub fn record(&self, metric_name: &str, value: f64, timestamp: DateTime<Utc>) {
        let window = self.window_handle(metric_name);
        let mut window = window.lock();
        window.record(value, timestamp, &self.config);

        debug!(
            metric = %metric_name,
            value,
            samples = window.samples.len(),
            "recorded baseline sample"
        );
    }

    /// Records one sample stamped with the current time.
    pub fn record_now(&self, metric_name: &str, value: f64) {
        self.record(metric_name, value, Utc::now());
    }

    /// Returns the baseline for a metric, or `None` until the window has
    /// accumulated at least `minimum_samples`.
    #[must_use]
    pub fn baseline(&self, metric_name: &str) -> Option<PerformanceBaseline> {
        let window = {
            let windows = self.windows.read();
            windows.get(metric_name).cloned()?
        };
        let window = window.lock();

        if window.samples.len() < self.config.minimum_samples {
            return None;
        }

        let values = window.values();
        Some(compute_baseline(
            metric_name,
            &values,
            window.ewma_mean,
            window.ewma_var.max(0.0).sqrt(),
        ))
    }

    /// Returns the number of samples currently held for a metric.
    #[must_use]
    pub fn sample_count(&self, metric_name: &str) -> usize {
        let windows = self.windows.read();
        windows
            .get(metric_name)
            .map_or(0, |w| w.lock().samples.len())
    }

    /// Returns a copy of the raw values in a metric's window, oldest first.
    #[must_use]
    pub fn window_values(&self, metric_name: &str) -> Vec<f64> {
        let windows = self.windows.read();
        windows
            .get(metric_name)
            .map(|w| w.lock().values())
            .unwrap_or_default()
    }

    /// Discards all samples and EWMA state for a metric.
    pub fn reset(&self, metric_name: &str) {
        let mut windows = self.windows.write();
        windows.remove(metric_name);
    }

    /// Returns the names of all metrics with at least one sample.
    #[must_use]
    pub fn metric_names(&self) -> Vec<String> {
        self.windows.read().keys().cloned().collect()
    }

    fn window_handle(&self, metric_name: &str) -> Arc<Mutex<MetricWindow>> {
        if let Some(window) = self.windows.read().get(metric_name) {
            return Arc::clone(window);
        }

        let mut windows = self.windows.write();
        Arc::clone(windows.entry(metric_name.to_string()).or_default())
    }
}

impl Clone for BaselineStore {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            windows: Arc::clone(&self.windows),
        }
    }
}

impl Default for BaselineStore {
    fn default() -> Self {
        Self::new(BaselineConfig::default())
    }
}

/// Computes window statistics for a non-empty value set.
fn compute_baseline(
    metric_name: &str,
    values: &[f64],
    ewma_mean: f64,
    ewma_std_dev: f64,
) -> PerformanceBaseline {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;

    let std_dev = if n > 1 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let min_value = sorted.first().copied().unwrap_or(0.0);
    let max_value = sorted.last().copied().unwrap_or(0.0);

    PerformanceBaseline {
        metric_name: metric_name.to_string(),
        mean,
        std_dev,
        p95: percentile(&sorted, 95.0),
        p99: percentile(&sorted, 99.0),
        min_value,
        max_value,
        sample_count: n,
        confidence_interval: confidence_interval(mean, std_dev, n),
        ewma_mean,
        ewma_std_dev,
        last_updated: Utc::now(),
    }
}

/// Linear-interpolation percentile over sorted values.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }

    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// 95% confidence interval for the mean using Student's t with n-1 df.
fn confidence_interval(mean: f64, std_dev: f64, n: usize) -> (f64, f64) {
    if n < 2 || std_dev <= 0.0 {
        return (mean, mean);
    }

    let Ok(t_dist) = StudentsT::new(0.0, 1.0, (n - 1) as f64) else {
        return (mean, mean);
    };
    let t_value = t_dist.inverse_cdf(0.975);
    let margin = t_value * std_dev / (n as f64).sqrt();
    (mean - margin, mean + margin)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_store() -> BaselineStore {
        BaselineStore::new(BaselineConfig::default().with_minimum_samples(5))
    }

    mod readiness_tests {
        use super::*;

        #[test]
        fn no_baseline_before_minimum_samples() {
            let store = small_store();
            for i in 0..4 {
                store.record_now("m", f64::from(i));
            }
            assert!(store.baseline("m").is_none());
        }

        #[test]
        fn baseline_appears_at_minimum_samples() {
            let store = small_store();
            for i in 0..5 {
                store.record_now("m", f64::from(i));
            }
            let baseline = store.baseline("m");
            assert!(baseline.is_some());
        }

        #[test]
        fn unknown_metric_has_no_baseline() {
            let store = small_store();
            assert!(store.baseline("missing").is_none());
        }

        #[test]
        fn reset_clears_window() {
            let store = small_store();
            for i in 0..10 {
                store.record_now("m", f64::from(i));
            }
            store.reset("m");
            assert_eq!(store.sample_count("m"), 0);
            assert!(store.baseline("m").is_none());
        }
    }

    mod statistics_tests {
        use super::*;

        #[test]
        fn mean_and_std_dev_match_direct_calculation() {
            let store = small_store();
            let values = [10.0, 12.0, 9.0, 11.0, 13.0, 10.5, 9.5, 12.5];
            for v in values {
                store.record_now("m", v);
            }

            let baseline = store
                .baseline("m")
                .unwrap_or_else(|| panic!("baseline should exist"));

            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance =
                values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

            assert!((baseline.mean - mean).abs() < 1e-9);
            assert!((baseline.std_dev - variance.sqrt()).abs() < 1e-9);
            assert_eq!(baseline.sample_count, values.len());
        }

        #[test]
        fn min_max_track_window_extremes() {
            let store = small_store();
            for v in [5.0, 1.0, 9.0, 4.0, 7.0] {
                store.record_now("m", v);
            }

            let baseline = store
                .baseline("m")
                .unwrap_or_else(|| panic!("baseline should exist"));
            assert!((baseline.min_value - 1.0).abs() < 1e-9);
            assert!((baseline.max_value - 9.0).abs() < 1e-9);
        }

        #[test]
        fn percentiles_interpolate() {
            // 0..=100 gives p95 = 95.0 and p99 = 99.0 exactly.
            let store = small_store();
            for i in 0..=100 {
                store.record_now("m", f64::from(i));
            }

            let baseline = store
                .baseline("m")
                .unwrap_or_else(|| panic!("baseline should exist"));
            assert!((baseline.p95 - 95.0).abs() < 1e-9);
            assert!((baseline.p99 - 99.0).abs() < 1e-9);
        }

        #[test]
        fn confidence_interval_brackets_mean() {
            let store = small_store();
            for v in [10.0, 11.0, 9.0, 10.5, 9.5, 10.2, 9.8, 10.1] {
                store.record_now("m", v);
            }

            let baseline = store
                .baseline("m")
                .unwrap_or_else(|| panic!("baseline should exist"));
            let (lo, hi) = baseline.confidence_interval;
            assert!(lo < baseline.mean);
            assert!(hi > baseline.mean);
        }

        #[test]
        fn zero_variation_yields_zero_std_dev() {
            let store = small_store();
            for _ in 0..10 {
                store.record_now("m", 42.0);
            }

            let baseline = store
                .baseline("m")
                .unwrap_or_else(|| panic!("baseline should exist"));
            assert!(baseline.std_dev.abs() < 1e-12);
            assert_eq!(baseline.confidence_interval, (42.0, 42.0));
        }

        #[test]
        fn ewma_tracks_drift_faster_than_window_mean() {
            let store = small_store();
            for _ in 0..50 {
                store.record_now("m", 100.0);
            }
            for _ in 0..10 {
                store.record_now("m", 200.0);
            }

            let baseline = store
                .baseline("m")
                .unwrap_or_else(|| panic!("baseline should exist"));
            assert!(baseline.ewma_mean > baseline.mean);
        }
    }

    mod window_tests {
        use super::*;

        #[test]
        fn window_is_capped() {
            let store = BaselineStore::new(
                BaselineConfig::default()
                    .with_minimum_samples(5)
                    .with_max_window_samples(100),
            );
            for i in 0..250 {
                store.record_now("m", f64::from(i));
            }
            assert_eq!(store.sample_count("m"), 100);

            // Oldest samples were evicted, so the minimum reflects the cap.
            let baseline = store
                .baseline("m")
                .unwrap_or_else(|| panic!("baseline should exist"));
            assert!((baseline.min_value - 150.0).abs() < 1e-9);
        }

        #[test]
        fn old_samples_are_pruned_by_age() {
            let store = small_store();
            let stale = Utc::now() - Duration::hours(48);
            for i in 0..10 {
                store.record("m", f64::from(i), stale);
            }
            // A fresh insert prunes everything outside the 24h window.
            store.record_now("m", 5.0);
            assert_eq!(store.sample_count("m"), 1);
        }

        #[test]
        fn clone_shares_windows() {
            let store = small_store();
            let handle = store.clone();
            for i in 0..5 {
                handle.record_now("m", f64::from(i));
            }
            assert_eq!(store.sample_count("m"), 5);
            assert!(store.baseline("m").is_some());
        }
    }
}
