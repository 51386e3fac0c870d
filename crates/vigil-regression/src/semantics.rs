//! Metric semantic classification.
//!
//! The "bad" direction of a deviation depends on what a metric measures:
//! latency getting larger is a regression, throughput getting larger is
//! not. The class is derived from tokens in the metric name.

use serde::{Deserialize, Serialize};

/// The direction in which a metric degrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSemantics {
    /// Larger values are worse (latency, usage, error counts).
    HigherIsWorse,
    /// Smaller values are worse (throughput, efficiency).
    LowerIsWorse,
    /// No known direction; only magnitude of deviation matters.
    Neutral,
}

impl MetricSemantics {
    /// Classifies a metric by its name tokens.
    #[must_use]
    pub fn classify(metric_name: &str) -> Self {
        let name = metric_name.to_ascii_lowercase();

        if name.ends_with("_time_ms")
            || name.contains("latency")
            || name.contains("_usage_percent")
            || name.starts_with("error")
            || name.contains(".duration_ms")
        {
            return Self::HigherIsWorse;
        }

        if name.contains("throughput")
            || name.contains("requests_per_second")
            || name.contains("efficiency")
        {
            return Self::LowerIsWorse;
        }

        Self::Neutral
    }

    /// Returns true if a deviation from `baseline` to `current` points in
    /// the degrading direction. Neutral metrics degrade in both directions.
    #[must_use]
    pub fn is_bad_direction(&self, baseline: f64, current: f64) -> bool {
        match self {
            Self::HigherIsWorse => current > baseline,
            Self::LowerIsWorse => current < baseline,
            Self::Neutral => (current - baseline).abs() > f64::EPSILON,
        }
    }

    /// Returns true if this metric counts errors.
    #[must_use]
    pub fn is_error_class(metric_name: &str) -> bool {
        metric_name.to_ascii_lowercase().starts_with("error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("api_response_time_ms", MetricSemantics::HigherIsWorse; "time suffix")]
    #[test_case("p99_latency_ms", MetricSemantics::HigherIsWorse; "latency token")]
    #[test_case("memory_usage_percent", MetricSemantics::HigherIsWorse; "usage token")]
    #[test_case("error_rate_percent", MetricSemantics::HigherIsWorse; "error prefix")]
    #[test_case("probes.network.duration_ms", MetricSemantics::HigherIsWorse; "probe duration")]
    #[test_case("throughput_requests_per_second", MetricSemantics::LowerIsWorse; "throughput")]
    #[test_case("requests_per_second", MetricSemantics::LowerIsWorse; "rps")]
    #[test_case("manufacturing_efficiency", MetricSemantics::LowerIsWorse; "efficiency")]
    #[test_case("queue_depth", MetricSemantics::Neutral; "unknown")]
    fn classification(name: &str, expected: MetricSemantics) {
        assert_eq!(MetricSemantics::classify(name), expected);
    }

    #[test]
    fn bad_direction_respects_class() {
        assert!(MetricSemantics::HigherIsWorse.is_bad_direction(100.0, 150.0));
        assert!(!MetricSemantics::HigherIsWorse.is_bad_direction(100.0, 50.0));

        assert!(MetricSemantics::LowerIsWorse.is_bad_direction(100.0, 50.0));
        assert!(!MetricSemantics::LowerIsWorse.is_bad_direction(100.0, 150.0));

        assert!(MetricSemantics::Neutral.is_bad_direction(100.0, 150.0));
        assert!(MetricSemantics::Neutral.is_bad_direction(100.0, 50.0));
    }

    #[test]
    fn error_class_detection() {
        assert!(MetricSemantics::is_error_class("error_rate_percent"));
        assert!(MetricSemantics::is_error_class("errors_per_minute"));
        assert!(!MetricSemantics::is_error_class("api_response_time_ms"));
    }
}
