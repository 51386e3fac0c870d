//! Regression detection result types and configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_evidence::EvidenceValue;

/// Severity of a detected regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegressionSeverity {
    /// Minor deviation, informational.
    Low,
    /// Breach of the p95 / 2-sigma band.
    Medium,
    /// Breach of the p99 / 3-sigma band.
    High,
    /// Error-class metric breached its p99 band.
    Critical,
}

impl RegressionSeverity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RegressionSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The method that produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Z-score and percent-deviation comparison against the baseline.
    Statistical,
    /// Isolation-style outlier scoring against the window distribution.
    DistributionalOutlier,
    /// Welch's t-test over two adjacent windows.
    ChangePoint,
}

impl DetectionMethod {
    /// Returns the method as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Statistical => "statistical",
            Self::DistributionalOutlier => "distributional_outlier",
            Self::ChangePoint => "change_point",
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The verdict of one detection method for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionDetectionResult {
    /// Whether the method classified the observation as a regression.
    pub is_regression: bool,
    /// Severity of the deviation.
    pub severity: RegressionSeverity,
    /// Confidence in the verdict, in `[0, 1]`.
    pub confidence: f64,
    /// When the detection ran.
    pub detected_at: DateTime<Utc>,
    /// The baseline value compared against (window mean).
    pub baseline_value: f64,
    /// The observed value.
    pub current_value: f64,
    /// Percent deviation from the baseline value.
    pub deviation_percent: f64,
    /// The method that produced this verdict.
    pub detection_method: DetectionMethod,
    /// Supporting evidence for the verdict.
    pub evidence: EvidenceValue,
}

/// Combined analysis of one observation across all enabled methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionAnalysis {
    /// The metric analyzed.
    pub metric_name: String,
    /// The observed value.
    pub current_value: f64,
    /// Positive detections, one per method that flagged.
    pub detections: Vec<RegressionDetectionResult>,
    /// Whether enough methods concurred to call this a regression.
    pub is_regression: bool,
}

impl RegressionAnalysis {
    /// Returns the highest severity among positive detections.
    #[must_use]
    pub fn max_severity(&self) -> Option<RegressionSeverity> {
        self.detections.iter().map(|d| d.severity).max()
    }

    /// Returns the highest confidence among positive detections.
    #[must_use]
    pub fn max_confidence(&self) -> f64 {
        self.detections
            .iter()
            .map(|d| d.confidence)
            .fold(0.0, f64::max)
    }
}

/// Configuration for the regression detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// General percent-deviation threshold for flagging a regression.
    pub regression_threshold_percent: f64,
    /// How many methods must concur before the combined analysis reports a
    /// regression (1 = any positive method).
    pub required_method_votes: usize,
    /// Number of isolation trees in the outlier model.
    pub outlier_trees: usize,
    /// Outlier score above which an observation is flagged.
    pub outlier_score_threshold: f64,
    /// Seed for the outlier model, so repeated fits are reproducible.
    pub outlier_seed: u64,
    /// Size of each of the two adjacent change-point windows.
    pub change_point_window: usize,
    /// Significance level for the change-point t-test.
    pub change_point_p_value: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            regression_threshold_percent: 10.0,
            required_method_votes: 1,
            outlier_trees: 64,
            outlier_score_threshold: 0.65,
            outlier_seed: 42,
            change_point_window: 10,
            change_point_p_value: 0.05,
        }
    }
}

impl DetectorConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the percent-deviation threshold.
    #[must_use]
    pub const fn with_threshold_percent(mut self, percent: f64) -> Self {
        self.regression_threshold_percent = percent;
        self
    }

    /// Sets the number of concurring methods required.
    #[must_use]
    pub const fn with_required_votes(mut self, votes: usize) -> Self {
        self.required_method_votes = votes;
        self
    }
}
