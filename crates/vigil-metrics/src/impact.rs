//! Shared impact assessment logic.
//!
//! Collectors convert raw metric deviations into monetary impact with this
//! assessor: per-metric deviations against baseline are multiplied by
//! collector-supplied impact multipliers, summed, and classified by both
//! percent change and absolute loss.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use vigil_baseline::BaselineStore;
use vigil_evidence::EvidenceValue;

use crate::types::{BusinessMetric, ImpactLevel, TriggerType};

/// How long a metric stays fully fresh before its confidence decays.
const FRESHNESS_WINDOW_SECONDS: f64 = 300.0;

/// Per-metric rules a collector supplies to the assessor.
#[derive(Debug, Clone)]
pub struct MetricImpactRule {
    /// Monetary loss per unit of adverse deviation.
    pub loss_per_unit: Decimal,
    /// The trigger category this metric contributes to.
    pub category: TriggerType,
    /// Whether a drop below baseline (rather than a rise above it) is the
    /// adverse direction.
    pub lower_is_worse: bool,
    /// Whether this metric's percent deviation participates in level
    /// classification. Monetary deviations are classified by absolute
    /// loss only; ratio metrics (efficiency, quality) use both legs.
    pub percent_in_classification: bool,
}

impl MetricImpactRule {
    /// Creates a rule where rising above baseline is adverse.
    #[must_use]
    pub const fn higher_is_worse(loss_per_unit: Decimal, category: TriggerType) -> Self {
        Self {
            loss_per_unit,
            category,
            lower_is_worse: false,
            percent_in_classification: true,
        }
    }

    /// Creates a rule where falling below baseline is adverse.
    #[must_use]
    pub const fn lower_is_worse(loss_per_unit: Decimal, category: TriggerType) -> Self {
        Self {
            loss_per_unit,
            category,
            lower_is_worse: true,
            percent_in_classification: true,
        }
    }

    /// Excludes this metric's percent deviation from level classification.
    #[must_use]
    pub const fn monetary(mut self) -> Self {
        self.percent_in_classification = false;
        self
    }
}

/// One metric's contribution to an assessment.
#[derive(Debug, Clone)]
pub struct MetricContribution {
    /// The metric name.
    pub metric_name: String,
    /// Baseline value the deviation was measured against.
    pub baseline_value: Decimal,
    /// Observed value.
    pub current_value: Decimal,
    /// Adverse deviation in metric units (zero when favorable).
    pub adverse_deviation: Decimal,
    /// Percent deviation from baseline.
    pub deviation_percent: f64,
    /// Monetary loss attributed to this metric.
    pub loss: Decimal,
    /// Trigger category of this metric.
    pub category: TriggerType,
    /// Whether the percent deviation feeds classification.
    pub percent_in_classification: bool,
}

/// Outcome of running the assessor over a metric batch.
#[derive(Debug, Clone)]
pub struct ImpactComputation {
    /// Per-metric contributions (only metrics with a rule and a baseline).
    pub contributions: Vec<MetricContribution>,
    /// Sum of per-metric losses.
    pub total_loss: Decimal,
    /// Largest percent deviation among adverse contributions.
    pub max_deviation_percent: f64,
    /// Classified impact level.
    pub impact_level: ImpactLevel,
    /// Category of the largest contributor.
    pub trigger_type: TriggerType,
    /// Weighted confidence over the contributing metrics.
    pub confidence: f64,
}

impl ImpactComputation {
    /// Renders the computation as structured evidence.
    #[must_use]
    pub fn to_evidence(&self) -> EvidenceValue {
        let contributions: Vec<EvidenceValue> = self
            .contributions
            .iter()
            .map(|c| {
                EvidenceValue::map()
                    .with("metric", c.metric_name.clone())
                    .with("baseline", c.baseline_value.to_string())
                    .with("current", c.current_value.to_string())
                    .with("deviation_percent", c.deviation_percent)
                    .with("loss", c.loss.to_string())
                    .with("category", c.category.as_str())
            })
            .collect();

        EvidenceValue::map()
            .with("contributions", EvidenceValue::Seq(contributions))
            .with("total_loss", self.total_loss.to_string())
            .with("max_deviation_percent", self.max_deviation_percent)
            .with("impact_level", self.impact_level.as_str())
            .with("trigger_type", self.trigger_type.as_str())
            .with("confidence", self.confidence)
    }
}

/// Converts metric deviations into quantified monetary impact.
#[derive(Debug, Clone, Default)]
pub struct ImpactAssessor {
    rules: BTreeMap<String, MetricImpactRule>,
}

impl ImpactAssessor {
    /// Creates an assessor with no rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule for one metric name.
    #[must_use]
    pub fn with_rule(mut self, metric_name: impl Into<String>, rule: MetricImpactRule) -> Self {
        self.rules.insert(metric_name.into(), rule);
        self
    }

    /// Runs the assessment over a metric batch.
    ///
    /// Metrics without a rule or without a ready baseline are skipped; an
    /// empty batch produces a `None`-level computation with zero loss and
    /// zero confidence.
    #[must_use]
    pub fn compute(&self, metrics: &[BusinessMetric], baselines: &BaselineStore) -> ImpactComputation {
        let mut contributions = Vec::new();

        for metric in metrics {
            let Some(rule) = self.rules.get(&metric.name) else {
                continue;
            };
            let Some(baseline) = baselines.baseline(&metric.name) else {
                continue;
            };
            let Some(baseline_value) = Decimal::from_f64(baseline.mean) else {
                continue;
            };

            let raw_deviation = metric.value - baseline_value;
            let adverse_deviation = if rule.lower_is_worse {
                (-raw_deviation).max(Decimal::ZERO)
            } else {
                raw_deviation.max(Decimal::ZERO)
            };

            let deviation_percent = if baseline.mean.abs() > f64::EPSILON {
                let adverse = adverse_deviation.to_f64().unwrap_or(0.0);
                adverse / baseline.mean.abs() * 100.0
            } else {
                0.0
            };

            contributions.push(MetricContribution {
                metric_name: metric.name.clone(),
                baseline_value,
                current_value: metric.value,
                adverse_deviation,
                deviation_percent,
                loss: adverse_deviation * rule.loss_per_unit,
                category: rule.category,
                percent_in_classification: rule.percent_in_classification,
            });
        }

        let total_loss: Decimal = contributions.iter().map(|c| c.loss).sum();
        let max_deviation_percent = contributions
            .iter()
            .filter(|c| c.percent_in_classification)
            .map(|c| c.deviation_percent)
            .fold(0.0, f64::max);

        let impact_level = classify_impact(max_deviation_percent, total_loss);
        let trigger_type = contributions
            .iter()
            .max_by_key(|c| c.loss)
            .map_or(TriggerType::RevenueLoss, |c| c.category);

        let confidence = weighted_confidence(metrics, &contributions);

        ImpactComputation {
            contributions,
            total_loss,
            max_deviation_percent,
            impact_level,
            trigger_type,
            confidence,
        }
    }
}

/// Classifies impact by percent change and absolute loss, taking the more
/// severe of the two.
#[must_use]
pub fn classify_impact(percent_change: f64, loss: Decimal) -> ImpactLevel {
    if percent_change >= 50.0 || loss >= Decimal::from(1_000_000) {
        ImpactLevel::Catastrophic
    } else if percent_change >= 25.0 || loss >= Decimal::from(100_000) {
        ImpactLevel::Critical
    } else if percent_change >= 10.0 || loss >= Decimal::from(10_000) {
        ImpactLevel::High
    } else if percent_change >= 5.0 || loss >= Decimal::from(1_000) {
        ImpactLevel::Medium
    } else if percent_change >= 1.0 || loss >= Decimal::from(100) {
        ImpactLevel::Low
    } else {
        ImpactLevel::None
    }
}

/// Confidence score for a single metric: freshness decays linearly over a
/// five-minute window, scaled by the source reliability table and the
/// collector-assigned confidence.
#[must_use]
pub fn metric_confidence(metric: &BusinessMetric) -> f64 {
    let age_seconds = metric.age_at(Utc::now()).num_milliseconds() as f64 / 1000.0;
    let freshness = (1.0 - age_seconds / FRESHNESS_WINDOW_SECONDS).clamp(0.0, 1.0);
    freshness * metric.source.reliability() * metric.confidence
}

/// Loss-weighted mean confidence over the contributing metrics; falls back
/// to the arithmetic mean when no loss was attributed.
fn weighted_confidence(metrics: &[BusinessMetric], contributions: &[MetricContribution]) -> f64 {
    if metrics.is_empty() {
        return 0.0;
    }

    let by_name: BTreeMap<&str, f64> = metrics
        .iter()
        .map(|m| (m.name.as_str(), metric_confidence(m)))
        .collect();

    let total_loss: f64 = contributions
        .iter()
        .map(|c| c.loss.to_f64().unwrap_or(0.0))
        .sum();

    if total_loss > 0.0 {
        contributions
            .iter()
            .map(|c| {
                by_name.get(c.metric_name.as_str()).copied().unwrap_or(0.0)
                    * c.loss.to_f64().unwrap_or(0.0)
            })
            .sum::<f64>()
            / total_loss
    } else {
        by_name.values().sum::<f64>() / by_name.len() as f64
    }
}

/// Aggregated impact across all collectors in one monitoring cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct OverallImpact {
    /// The highest impact level among the assessments.
    pub impact_level: ImpactLevel,
    /// Sum of estimated losses.
    pub total_estimated_loss: Decimal,
    /// Loss-weighted mean confidence.
    pub confidence: f64,
    /// Number of assessments above `None`.
    pub affected_systems: usize,
    /// Number of assessments aggregated.
    pub assessment_count: usize,
}

impl OverallImpact {
    /// Aggregates a cycle's assessments.
    #[must_use]
    pub fn aggregate(assessments: &[crate::types::BusinessImpactAssessment]) -> Self {
        if assessments.is_empty() {
            return Self {
                impact_level: ImpactLevel::None,
                total_estimated_loss: Decimal::ZERO,
                confidence: 0.0,
                affected_systems: 0,
                assessment_count: 0,
            };
        }

        let total_estimated_loss: Decimal =
            assessments.iter().map(|a| a.estimated_loss).sum();
        let impact_level = assessments
            .iter()
            .map(|a| a.impact_level)
            .max()
            .unwrap_or(ImpactLevel::None);

        let loss_f64 = total_estimated_loss.to_f64().unwrap_or(0.0);
        let confidence = if loss_f64 > 0.0 {
            assessments
                .iter()
                .map(|a| a.confidence * a.estimated_loss.to_f64().unwrap_or(0.0))
                .sum::<f64>()
                / loss_f64
        } else {
            assessments.iter().map(|a| a.confidence).sum::<f64>() / assessments.len() as f64
        };

        let affected_systems = assessments
            .iter()
            .filter(|a| a.impact_level != ImpactLevel::None)
            .count();

        Self {
            impact_level,
            total_estimated_loss,
            confidence,
            affected_systems,
            assessment_count: assessments.len(),
        }
    }

    /// Renders the aggregate as structured evidence.
    #[must_use]
    pub fn to_evidence(&self) -> EvidenceValue {
        EvidenceValue::map()
            .with("impact_level", self.impact_level.as_str())
            .with("total_estimated_loss", self.total_estimated_loss.to_string())
            .with("confidence", self.confidence)
            .with("affected_systems", self.affected_systems)
            .with("assessment_count", self.assessment_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BusinessImpactAssessment, MetricSource};
    use test_case::test_case;
    use vigil_baseline::BaselineConfig;

    mod classification_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(0.5, 50, ImpactLevel::None; "negligible")]
        #[test_case(1.5, 0, ImpactLevel::Low; "low by percent")]
        #[test_case(0.0, 150, ImpactLevel::Low; "low by loss")]
        #[test_case(6.0, 0, ImpactLevel::Medium; "medium by percent")]
        #[test_case(0.0, 1_500, ImpactLevel::Medium; "medium by loss")]
        #[test_case(12.0, 0, ImpactLevel::High; "high by percent")]
        #[test_case(0.0, 15_000, ImpactLevel::High; "high by loss")]
        #[test_case(30.0, 0, ImpactLevel::Critical; "critical by percent")]
        #[test_case(0.0, 150_000, ImpactLevel::Critical; "critical by loss")]
        #[test_case(60.0, 0, ImpactLevel::Catastrophic; "catastrophic by percent")]
        #[test_case(0.0, 1_200_000, ImpactLevel::Catastrophic; "catastrophic by loss")]
        fn classify(percent: f64, loss: i64, expected: ImpactLevel) {
            assert_eq!(classify_impact(percent, Decimal::from(loss)), expected);
        }

        #[test]
        fn increasing_loss_never_lowers_the_level() {
            let mut previous = ImpactLevel::None;
            for loss in [0, 100, 1_000, 10_000, 100_000, 1_000_000, 5_000_000] {
                let level = classify_impact(0.0, Decimal::from(loss));
                assert!(level >= previous, "level dropped at loss {loss}");
                previous = level;
            }
        }

        #[test]
        fn increasing_percent_never_lowers_the_level() {
            let mut previous = ImpactLevel::None;
            for percent in [0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 90.0] {
                let level = classify_impact(percent, Decimal::ZERO);
                assert!(level >= previous, "level dropped at {percent}%");
                previous = level;
            }
        }
    }

    mod assessor_tests {
        use super::*;

        fn seeded_baselines() -> BaselineStore {
            let store = BaselineStore::new(BaselineConfig::default().with_minimum_samples(10));
            for _ in 0..20 {
                store.record_now("trading_pnl_per_minute", 1000.0);
                store.record_now("latency_ms", 50.0);
            }
            store
        }

        fn assessor() -> ImpactAssessor {
            ImpactAssessor::new()
                .with_rule(
                    "trading_pnl_per_minute",
                    MetricImpactRule::lower_is_worse(Decimal::ONE, TriggerType::RevenueLoss),
                )
                .with_rule(
                    "latency_ms",
                    MetricImpactRule::higher_is_worse(
                        Decimal::from(100),
                        TriggerType::LatencyDegradation,
                    ),
                )
        }

        #[test]
        fn matching_baseline_yields_no_impact() {
            let baselines = seeded_baselines();
            let metrics = vec![
                BusinessMetric::builder("trading_pnl_per_minute", Decimal::from(1000))
                    .source(MetricSource::Live)
                    .build(),
            ];

            let computation = assessor().compute(&metrics, &baselines);
            assert_eq!(computation.impact_level, ImpactLevel::None);
            assert_eq!(computation.total_loss, Decimal::ZERO);
        }

        #[test]
        fn revenue_drop_is_priced_per_unit() {
            let baselines = seeded_baselines();
            let metrics = vec![
                BusinessMetric::builder("trading_pnl_per_minute", Decimal::from(-9000))
                    .source(MetricSource::Live)
                    .build(),
            ];

            let computation = assessor().compute(&metrics, &baselines);
            // Deviation of 10,000 units at $1/unit.
            assert_eq!(computation.total_loss, Decimal::from(10_000));
            assert_eq!(computation.impact_level, ImpactLevel::Catastrophic);
            assert_eq!(computation.trigger_type, TriggerType::RevenueLoss);
        }

        #[test]
        fn favorable_deviation_contributes_nothing() {
            let baselines = seeded_baselines();
            let metrics = vec![
                BusinessMetric::builder("trading_pnl_per_minute", Decimal::from(5000))
                    .source(MetricSource::Live)
                    .build(),
                BusinessMetric::builder("latency_ms", Decimal::from(10))
                    .source(MetricSource::Live)
                    .build(),
            ];

            let computation = assessor().compute(&metrics, &baselines);
            assert_eq!(computation.total_loss, Decimal::ZERO);
            assert_eq!(computation.impact_level, ImpactLevel::None);
        }

        #[test]
        fn trigger_follows_largest_contributor() {
            let baselines = seeded_baselines();
            let metrics = vec![
                BusinessMetric::builder("trading_pnl_per_minute", Decimal::from(990))
                    .source(MetricSource::Live)
                    .build(),
                BusinessMetric::builder("latency_ms", Decimal::from(250))
                    .source(MetricSource::Live)
                    .build(),
            ];

            let computation = assessor().compute(&metrics, &baselines);
            // Latency: 200ms over baseline at $100/ms dominates the $10
            // revenue shortfall.
            assert_eq!(computation.trigger_type, TriggerType::LatencyDegradation);
        }

        #[test]
        fn fresh_live_metrics_have_high_confidence() {
            let baselines = seeded_baselines();
            let metrics = vec![
                BusinessMetric::builder("trading_pnl_per_minute", Decimal::from(500))
                    .source(MetricSource::Live)
                    .build(),
            ];

            let computation = assessor().compute(&metrics, &baselines);
            assert!(computation.confidence > 0.9);
        }

        #[test]
        fn stale_metrics_lose_confidence() {
            let baselines = seeded_baselines();
            let stale = BusinessMetric::builder("trading_pnl_per_minute", Decimal::from(500))
                .timestamp(Utc::now() - chrono::Duration::minutes(10))
                .source(MetricSource::Live)
                .build();

            let computation = assessor().compute(&[stale], &baselines);
            assert!(computation.confidence.abs() < f64::EPSILON);
        }

        #[test]
        fn empty_batch_is_none_with_zero_confidence() {
            let baselines = seeded_baselines();
            let computation = assessor().compute(&[], &baselines);
            assert_eq!(computation.impact_level, ImpactLevel::None);
            assert!(computation.confidence.abs() < f64::EPSILON);
        }
    }

    mod overall_tests {
        use super::*;
        use vigil_evidence::EvidenceValue;

        fn assessment(level: ImpactLevel, loss: i64, confidence: f64) -> BusinessImpactAssessment {
            BusinessImpactAssessment::new(
                "deploy-1",
                level,
                Decimal::from(loss),
                confidence,
                TriggerType::RevenueLoss,
                EvidenceValue::map(),
                Vec::new(),
                "test",
            )
        }

        #[test]
        fn empty_aggregate_is_none() {
            let overall = OverallImpact::aggregate(&[]);
            assert_eq!(overall.impact_level, ImpactLevel::None);
            assert_eq!(overall.total_estimated_loss, Decimal::ZERO);
        }

        #[test]
        fn highest_level_and_summed_loss() {
            let overall = OverallImpact::aggregate(&[
                assessment(ImpactLevel::Medium, 2_000, 0.8),
                assessment(ImpactLevel::Critical, 150_000, 0.9),
                assessment(ImpactLevel::None, 0, 0.0),
            ]);

            assert_eq!(overall.impact_level, ImpactLevel::Critical);
            assert_eq!(overall.total_estimated_loss, Decimal::from(152_000));
            assert_eq!(overall.affected_systems, 2);
            assert_eq!(overall.assessment_count, 3);
        }

        #[test]
        fn confidence_is_loss_weighted() {
            let overall = OverallImpact::aggregate(&[
                assessment(ImpactLevel::Low, 100, 0.2),
                assessment(ImpactLevel::Critical, 100_000, 0.9),
            ]);
            // The large loss dominates the weighting.
            assert!(overall.confidence > 0.89);
        }
    }
}
