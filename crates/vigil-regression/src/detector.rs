//! The multi-method regression detector.
//!
//! Three complementary methods examine every observation: a statistical
//! comparison against the baseline, a distributional outlier score, and a
//! change-point test over the recent window. Any positive method produces
//! a detection; the combined verdict optionally requires several methods
//! to concur.

use chrono::Utc;
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;
use vigil_baseline::{BaselineStore, PerformanceBaseline};
use vigil_evidence::EvidenceValue;

use crate::outlier::OutlierModel;
use crate::semantics::MetricSemantics;
use crate::types::{
    DetectionMethod, DetectorConfig, RegressionAnalysis, RegressionDetectionResult,
    RegressionSeverity,
};

/// Detects regressions for metric observations against a baseline store.
#[derive(Debug, Clone)]
pub struct RegressionDetector {
    config: DetectorConfig,
}

impl RegressionDetector {
    /// Creates a detector with the given configuration.
    #[must_use]
    pub const fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Returns the detector configuration.
    #[must_use]
    pub const fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Analyzes one observation against its baseline and window.
    ///
    /// Each method runs independently; identical inputs always produce the
    /// identical analysis. Without a ready baseline the analysis is empty
    /// and negative.
    #[must_use]
    pub fn analyze(
        &self,
        metric_name: &str,
        current_value: f64,
        store: &BaselineStore,
    ) -> RegressionAnalysis {
        let mut detections = Vec::new();

        if let Some(baseline) = store.baseline(metric_name) {
            let min_delta = store.config().minimum_absolute_delta;
            if let Some(result) =
                self.detect_statistical(metric_name, current_value, &baseline, min_delta)
            {
                detections.push(result);
            }

            let window = store.window_values(metric_name);
            if let Some(result) =
                self.detect_outlier(metric_name, current_value, &baseline, &window)
            {
                detections.push(result);
            }
            if let Some(result) = self.detect_change_point(metric_name, current_value, &window) {
                detections.push(result);
            }
        }

        let is_regression = detections.len() >= self.config.required_method_votes
            && !detections.is_empty();

        if is_regression {
            debug!(
                metric = %metric_name,
                value = current_value,
                methods = detections.len(),
                "regression detected"
            );
        }

        RegressionAnalysis {
            metric_name: metric_name.to_string(),
            current_value,
            detections,
            is_regression,
        }
    }

    /// Statistical detection: z-score in the degrading direction, or
    /// percent deviation beyond the configured threshold.
    fn detect_statistical(
        &self,
        metric_name: &str,
        current_value: f64,
        baseline: &PerformanceBaseline,
        minimum_absolute_delta: f64,
    ) -> Option<RegressionDetectionResult> {
        let semantics = MetricSemantics::classify(metric_name);
        let z_score = baseline.z_score(current_value);
        let deviation_percent = baseline.deviation_percent(current_value);
        let bad_direction = semantics.is_bad_direction(baseline.mean, current_value);

        // Windows without variation only flag past the absolute delta floor.
        if baseline.std_dev <= 0.0
            && (current_value - baseline.mean).abs() < minimum_absolute_delta
        {
            return None;
        }

        let sigma_breach = bad_direction && z_score.abs() > 2.0;
        let percent_breach = bad_direction
            && deviation_percent > self.config.regression_threshold_percent;

        if !sigma_breach && !percent_breach {
            return None;
        }

        let severity = statistical_severity(metric_name, current_value, baseline, z_score);
        let confidence = (z_score.abs() / 3.0).min(1.0);

        let evidence = EvidenceValue::map()
            .with("z_score", z_score)
            .with("baseline_mean", baseline.mean)
            .with("baseline_std_dev", baseline.std_dev)
            .with("baseline_samples", baseline.sample_count)
            .with("p95", baseline.p95)
            .with("p99", baseline.p99)
            .with(
                "confidence_interval",
                vec![baseline.confidence_interval.0, baseline.confidence_interval.1],
            );

        Some(RegressionDetectionResult {
            is_regression: true,
            severity,
            confidence,
            detected_at: Utc::now(),
            baseline_value: baseline.mean,
            current_value,
            deviation_percent,
            detection_method: DetectionMethod::Statistical,
            evidence,
        })
    }

    /// Outlier detection against a model fit on the current window.
    fn detect_outlier(
        &self,
        metric_name: &str,
        current_value: f64,
        baseline: &PerformanceBaseline,
        window: &[f64],
    ) -> Option<RegressionDetectionResult> {
        let model = OutlierModel::fit(window, self.config.outlier_trees, self.config.outlier_seed)?;
        let score = model.score(current_value);

        if score < self.config.outlier_score_threshold {
            return None;
        }

        let severity = if score > 0.8 {
            RegressionSeverity::High
        } else {
            RegressionSeverity::Medium
        };

        let evidence = EvidenceValue::map()
            .with("anomaly_score", score)
            .with("score_threshold", self.config.outlier_score_threshold)
            .with("model", "isolation_forest")
            .with("trees", self.config.outlier_trees);

        Some(RegressionDetectionResult {
            is_regression: true,
            severity,
            confidence: score.min(1.0),
            detected_at: Utc::now(),
            baseline_value: baseline.mean,
            current_value,
            deviation_percent: baseline.deviation_percent(current_value),
            detection_method: DetectionMethod::DistributionalOutlier,
            evidence: evidence.with("metric", metric_name),
        })
    }

    /// Change-point detection: Welch's t-test between two adjacent windows.
    fn detect_change_point(
        &self,
        metric_name: &str,
        current_value: f64,
        window: &[f64],
    ) -> Option<RegressionDetectionResult> {
        let w = self.config.change_point_window;
        if window.len() < w * 2 {
            return None;
        }

        let recent = &window[window.len() - w * 2..];
        let (first, second) = recent.split_at(w);

        let (t_stat, p_value) = welch_t_test(first, second)?;
        if p_value >= self.config.change_point_p_value {
            return None;
        }

        let first_mean = mean(first);
        let second_mean = mean(second);
        let change_percent = if first_mean.abs() > f64::EPSILON {
            (second_mean - first_mean).abs() / first_mean.abs() * 100.0
        } else {
            0.0
        };

        if change_percent <= self.config.regression_threshold_percent {
            return None;
        }

        let severity = if change_percent > 25.0 {
            RegressionSeverity::High
        } else {
            RegressionSeverity::Medium
        };

        let evidence = EvidenceValue::map()
            .with("t_statistic", t_stat)
            .with("p_value", p_value)
            .with("first_window_mean", first_mean)
            .with("second_window_mean", second_mean)
            .with("window_size", w)
            .with("metric", metric_name);

        Some(RegressionDetectionResult {
            is_regression: true,
            severity,
            confidence: 1.0 - p_value,
            detected_at: Utc::now(),
            baseline_value: first_mean,
            current_value,
            deviation_percent: change_percent,
            detection_method: DetectionMethod::ChangePoint,
            evidence,
        })
    }

}

impl Default for RegressionDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

/// Severity from percentile and sigma breaches, with the error-metric
/// escalation rule.
fn statistical_severity(
    metric_name: &str,
    current_value: f64,
    baseline: &PerformanceBaseline,
    z_score: f64,
) -> RegressionSeverity {
    let semantics = MetricSemantics::classify(metric_name);

    let p99_breach = match semantics {
        MetricSemantics::LowerIsWorse => {
            current_value < baseline.mean - 3.0 * baseline.std_dev
        }
        _ => current_value > baseline.p99 || z_score.abs() > 3.0,
    };
    let p95_breach = match semantics {
        MetricSemantics::LowerIsWorse => {
            current_value < baseline.mean - 2.0 * baseline.std_dev
        }
        _ => current_value > baseline.p95 || z_score.abs() > 2.0,
    };

    if p99_breach {
        if MetricSemantics::is_error_class(metric_name) {
            RegressionSeverity::Critical
        } else {
            RegressionSeverity::High
        }
    } else if p95_breach {
        RegressionSeverity::Medium
    } else {
        RegressionSeverity::Low
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

/// Welch's unequal-variance t-test; returns (t statistic, two-sided p).
fn welch_t_test(a: &[f64], b: &[f64]) -> Option<(f64, f64)> {
    if a.len() < 2 || b.len() < 2 {
        return None;
    }

    let mean_a = mean(a);
    let mean_b = mean(b);
    let var_a = variance(a, mean_a);
    let var_b = variance(b, mean_b);

    let se_a = var_a / a.len() as f64;
    let se_b = var_b / b.len() as f64;
    let pooled = se_a + se_b;

    if pooled <= 0.0 {
        // Identical constant windows: no detectable change.
        return None;
    }

    let t_stat = (mean_a - mean_b) / pooled.sqrt();

    // Welch–Satterthwaite degrees of freedom.
    let df = pooled.powi(2)
        / (se_a.powi(2) / (a.len() - 1) as f64 + se_b.powi(2) / (b.len() - 1) as f64);

    let t_dist = StudentsT::new(0.0, 1.0, df.max(1.0)).ok()?;
    let p_value = 2.0 * (1.0 - t_dist.cdf(t_stat.abs()));

    Some((t_stat, p_value.clamp(0.0, 1.0)))
}
