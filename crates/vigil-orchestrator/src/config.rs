//! Orchestrator configuration surface.
//!
//! All recognized options with their platform defaults. The struct
//! deserializes from any serde format the host process chooses; file
//! loading and CLI parsing are the host's concern.

use serde::{Deserialize, Serialize};
use vigil_collectors::{FinanceThresholds, PharmaThresholds};

/// Industry demo feeds the orchestrator can monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Industry {
    /// Finance trading demo.
    Finance,
    /// Pharma manufacturing demo.
    Pharma,
}

/// Recognized configuration options for the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Seconds between monitoring cycles.
    pub monitoring_interval_seconds: u64,
    /// Hours of history kept in metric baselines.
    pub baseline_window_hours: i64,
    /// Samples required before a baseline is usable.
    pub baseline_minimum_samples: usize,
    /// Percent-deviation threshold for regression detection.
    pub regression_threshold_percent: f64,
    /// Minimum decision confidence for a rollback recommendation.
    pub confidence_threshold: f64,
    /// Global rollback execution timeout in seconds.
    pub execution_timeout_seconds: u64,
    /// Per-probe execution timeout in seconds.
    pub probe_timeout_seconds: u64,
    /// Per-collector metric fetch timeout in seconds.
    pub collector_timeout_seconds: u64,
    /// Run health probes every this many monitoring cycles.
    pub probe_cycle_interval: u64,
    /// Grace window for active rollbacks at shutdown, in seconds.
    pub shutdown_grace_seconds: u64,
    /// Which industry collectors to register by default.
    pub enabled_industries: Vec<Industry>,
    /// Finance collector thresholds.
    pub finance: FinanceThresholds,
    /// Pharma collector thresholds.
    pub pharma: PharmaThresholds,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            monitoring_interval_seconds: 30,
            baseline_window_hours: 24,
            baseline_minimum_samples: 50,
            regression_threshold_percent: 10.0,
            confidence_threshold: 0.8,
            execution_timeout_seconds: 600,
            probe_timeout_seconds: 30,
            collector_timeout_seconds: 10,
            probe_cycle_interval: 5,
            shutdown_grace_seconds: 30,
            enabled_industries: vec![Industry::Finance, Industry::Pharma],
            finance: FinanceThresholds::default(),
            pharma: PharmaThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_contract() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.monitoring_interval_seconds, 30);
        assert_eq!(config.baseline_window_hours, 24);
        assert_eq!(config.baseline_minimum_samples, 50);
        assert!((config.regression_threshold_percent - 10.0).abs() < f64::EPSILON);
        assert!((config.confidence_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.execution_timeout_seconds, 600);
        assert_eq!(config.probe_timeout_seconds, 30);
        assert_eq!(config.shutdown_grace_seconds, 30);
        assert_eq!(config.enabled_industries.len(), 2);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let json = r#"{"monitoring_interval_seconds": 5, "enabled_industries": ["finance"]}"#;
        let config: OrchestratorConfig =
            serde_json::from_str(json).unwrap_or_else(|_| panic!("config should parse"));

        assert_eq!(config.monitoring_interval_seconds, 5);
        assert_eq!(config.enabled_industries, vec![Industry::Finance]);
        assert_eq!(config.baseline_window_hours, 24);
    }

    #[test]
    fn unknown_industry_is_rejected() {
        let json = r#"{"enabled_industries": ["aerospace"]}"#;
        let result: Result<OrchestratorConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
