//! Finance trading revenue collector.
//!
//! Observes a trading system's revenue stream and prices deviations from
//! baseline: direct PnL shortfall, latency-attributed losses, and failed
//! operation costs. Revenue deviations are classified by absolute loss;
//! execution quality uses both classification legs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tracing::warn;
use vigil_baseline::BaselineStore;
use vigil_evidence::{EvidenceLog, EvidenceValue};
use vigil_metrics::{
    BaselineSummary, BaselineSummaryEntry, BusinessImpactAssessment, BusinessMetric,
    ImpactAssessor, ImpactLevel, MetricImpactRule, MetricSource, MetricsCollector, TriggerType,
    classify_impact,
};

/// Evidence stream for finance collection events.
const EVIDENCE_STREAM: &str = "collectors/finance";

/// Revenue and cost thresholds for the trading collector.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FinanceThresholds {
    /// Per-minute revenue deviation above which impact is catastrophic.
    pub catastrophic_loss_per_minute: Decimal,
    /// Per-minute revenue deviation above which impact is critical.
    pub critical_loss_per_minute: Decimal,
    /// Per-minute revenue deviation above which impact is high.
    pub high_loss_per_minute: Decimal,
    /// Per-minute revenue deviation above which impact is medium.
    pub medium_loss_per_minute: Decimal,
    /// Expected revenue per minute under normal operation.
    pub baseline_revenue_per_minute: Decimal,
    /// Cost attributed to each millisecond of latency degradation.
    pub latency_cost_per_ms: Decimal,
    /// Cost attributed to each failed trade.
    pub error_cost_per_failed_trade: Decimal,
}

impl Default for FinanceThresholds {
    fn default() -> Self {
        Self {
            catastrophic_loss_per_minute: Decimal::from(50_000),
            critical_loss_per_minute: Decimal::from(10_000),
            high_loss_per_minute: Decimal::from(2_000),
            medium_loss_per_minute: Decimal::from(500),
            baseline_revenue_per_minute: Decimal::from(1_000),
            latency_cost_per_ms: Decimal::from(100),
            error_cost_per_failed_trade: Decimal::from(1_000),
        }
    }
}

/// One observation of the trading system.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSnapshot {
    /// Profit and loss per minute.
    pub pnl_per_minute: Decimal,
    /// Commission revenue per minute.
    pub commission_per_minute: Decimal,
    /// Latency degradation relative to normal, in milliseconds.
    pub latency_degradation_ms: f64,
    /// Failed trades since the last observation.
    pub failed_trades: u64,
    /// Execution quality score in `[0, 100]`.
    pub execution_quality_score: Decimal,
}

impl TradingSnapshot {
    /// A snapshot of a system operating exactly at baseline.
    #[must_use]
    pub fn at_baseline(thresholds: &FinanceThresholds) -> Self {
        Self {
            pnl_per_minute: thresholds.baseline_revenue_per_minute,
            commission_per_minute: Decimal::from(200),
            latency_degradation_ms: 0.0,
            failed_trades: 0,
            execution_quality_score: Decimal::from(98),
        }
    }
}

/// Source of trading observations.
#[async_trait]
pub trait TradingDataSource: Send + Sync {
    /// Produces the current observation.
    async fn snapshot(&self) -> anyhow::Result<TradingSnapshot>;
}

/// Simulated trading feed with gaussian noise around baseline.
#[derive(Debug)]
pub struct SimulatedTradingSource {
    thresholds: FinanceThresholds,
    rng: Mutex<StdRng>,
}

impl SimulatedTradingSource {
    /// Creates a seeded simulated source.
    #[must_use]
    pub fn new(thresholds: FinanceThresholds, seed: u64) -> Self {
        Self {
            thresholds,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl TradingDataSource for SimulatedTradingSource {
    async fn snapshot(&self) -> anyhow::Result<TradingSnapshot> {
        let mut rng = self.rng.lock();
        let baseline = self
            .thresholds
            .baseline_revenue_per_minute
            .to_f64()
            .unwrap_or(1000.0);

        let pnl = baseline * (1.0 + rng.gen_range(-0.05..0.05));
        let commission = 200.0 * (1.0 + rng.gen_range(-0.1..0.1));
        let quality = 98.0 + rng.gen_range(-1.5..1.5);

        Ok(TradingSnapshot {
            pnl_per_minute: Decimal::from_f64(pnl).unwrap_or_default(),
            commission_per_minute: Decimal::from_f64(commission).unwrap_or_default(),
            latency_degradation_ms: rng.gen_range(0.0..2.0),
            failed_trades: u64::from(rng.gen_range(0.0..1.0_f64) > 0.95),
            execution_quality_score: Decimal::from_f64(quality).unwrap_or_default(),
        })
    }
}

/// Fixed source for tests and dry runs.
#[derive(Debug, Clone)]
pub struct FixedTradingSource {
    snapshot: TradingSnapshot,
}

impl FixedTradingSource {
    /// Creates a source that always returns the given snapshot.
    #[must_use]
    pub const fn new(snapshot: TradingSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl TradingDataSource for FixedTradingSource {
    async fn snapshot(&self) -> anyhow::Result<TradingSnapshot> {
        Ok(self.snapshot.clone())
    }
}

/// Business-metric collector for the finance trading demo system.
pub struct TradingRevenueCollector {
    name: String,
    deployment_id: String,
    thresholds: FinanceThresholds,
    source: Arc<dyn TradingDataSource>,
    baselines: BaselineStore,
    evidence: EvidenceLog,
    assessor: ImpactAssessor,
}

impl TradingRevenueCollector {
    /// Creates a collector wired to the shared baseline store and
    /// evidence log.
    #[must_use]
    pub fn new(
        deployment_id: impl Into<String>,
        thresholds: FinanceThresholds,
        source: Arc<dyn TradingDataSource>,
        baselines: BaselineStore,
        evidence: EvidenceLog,
    ) -> Self {
        let assessor = ImpactAssessor::new()
            .with_rule(
                "trading_pnl_per_minute",
                MetricImpactRule::lower_is_worse(Decimal::ONE, TriggerType::RevenueLoss)
                    .monetary(),
            )
            .with_rule(
                "commission_revenue_per_minute",
                MetricImpactRule::lower_is_worse(Decimal::ONE, TriggerType::RevenueLoss)
                    .monetary(),
            )
            .with_rule(
                "latency_impact_loss",
                MetricImpactRule::higher_is_worse(
                    Decimal::ONE,
                    TriggerType::LatencyDegradation,
                )
                .monetary(),
            )
            .with_rule(
                "error_impact_loss",
                MetricImpactRule::higher_is_worse(Decimal::ONE, TriggerType::ErrorRateSpike)
                    .monetary(),
            )
            .with_rule(
                "execution_quality_score",
                MetricImpactRule::lower_is_worse(
                    Decimal::from(500),
                    TriggerType::CustomerImpact,
                ),
            );

        Self {
            name: "finance_trading".to_string(),
            deployment_id: deployment_id.into(),
            thresholds,
            source,
            baselines,
            evidence,
            assessor,
        }
    }

    /// Impact level floor from the per-minute revenue deviation tiers.
    fn revenue_tier_level(&self, revenue_deviation: Decimal) -> ImpactLevel {
        if revenue_deviation > self.thresholds.catastrophic_loss_per_minute {
            ImpactLevel::Catastrophic
        } else if revenue_deviation > self.thresholds.critical_loss_per_minute {
            ImpactLevel::Critical
        } else if revenue_deviation > self.thresholds.high_loss_per_minute {
            ImpactLevel::High
        } else if revenue_deviation > self.thresholds.medium_loss_per_minute {
            ImpactLevel::Medium
        } else if revenue_deviation > Decimal::ZERO {
            ImpactLevel::Low
        } else {
            ImpactLevel::None
        }
    }

    fn recommendation_for(level: ImpactLevel) -> &'static str {
        match level {
            ImpactLevel::Catastrophic | ImpactLevel::Critical => {
                "Revenue impact exceeds critical thresholds. Immediate rollback recommended."
            }
            ImpactLevel::High => {
                "Significant revenue degradation detected. Rollback recommended."
            }
            ImpactLevel::Medium | ImpactLevel::Low => {
                "Revenue deviation detected. Increase monitoring frequency and prepare rollback."
            }
            ImpactLevel::None => {
                "Continue monitoring. Revenue impact within acceptable thresholds."
            }
        }
    }
}

#[async_trait]
impl MetricsCollector for TradingRevenueCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect_metrics(&self) -> Vec<BusinessMetric> {
        let snapshot = match self.source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(collector = %self.name, %error, "trading snapshot failed");
                self.evidence.append(
                    EVIDENCE_STREAM,
                    "metric_collection_failed",
                    EvidenceValue::map()
                        .with("collector", self.name.clone())
                        .with("error", error.to_string()),
                );
                return Vec::new();
            }
        };

        let latency_loss = Decimal::from_f64(snapshot.latency_degradation_ms)
            .unwrap_or_default()
            * self.thresholds.latency_cost_per_ms;
        let error_loss =
            Decimal::from(snapshot.failed_trades) * self.thresholds.error_cost_per_failed_trade;

        vec![
            BusinessMetric::builder("trading_pnl_per_minute", snapshot.pnl_per_minute)
                .currency("USD")
                .source(MetricSource::Live)
                .metadata("category", "revenue")
                .build(),
            BusinessMetric::builder(
                "commission_revenue_per_minute",
                snapshot.commission_per_minute,
            )
            .currency("USD")
            .source(MetricSource::Live)
            .metadata("category", "revenue")
            .build(),
            BusinessMetric::builder("latency_impact_loss", latency_loss)
                .currency("USD")
                .source(MetricSource::Calculated)
                .metadata("latency_degradation_ms", snapshot.latency_degradation_ms.to_string())
                .build(),
            BusinessMetric::builder("error_impact_loss", error_loss)
                .currency("USD")
                .source(MetricSource::Calculated)
                .metadata("failed_trades", snapshot.failed_trades.to_string())
                .build(),
            BusinessMetric::builder(
                "execution_quality_score",
                snapshot.execution_quality_score,
            )
            .unit("score")
            .source(MetricSource::Live)
            .build(),
        ]
    }

    fn calculate_impact(&self, current_metrics: &[BusinessMetric]) -> BusinessImpactAssessment {
        if current_metrics.is_empty() {
            return BusinessImpactAssessment::none(&self.deployment_id);
        }

        let computation = self.assessor.compute(current_metrics, &self.baselines);

        // Revenue tier floors refine the loss-based classification.
        let revenue_deviation = current_metrics
            .iter()
            .find(|m| m.name == "trading_pnl_per_minute")
            .map_or(Decimal::ZERO, |m| {
                (self.thresholds.baseline_revenue_per_minute - m.value).max(Decimal::ZERO)
            });

        let tier_level = self.revenue_tier_level(revenue_deviation);
        let loss_level = classify_impact(
            computation.max_deviation_percent,
            computation.total_loss,
        );
        let impact_level = tier_level.max(loss_level);

        let evidence = computation
            .to_evidence()
            .with("revenue_deviation_per_minute", revenue_deviation.to_string())
            .with(
                "baseline_revenue_per_minute",
                self.thresholds.baseline_revenue_per_minute.to_string(),
            )
            .with("tier_level", tier_level.as_str());

        let assessment = BusinessImpactAssessment::new(
            &self.deployment_id,
            impact_level,
            computation.total_loss,
            computation.confidence,
            computation.trigger_type,
            evidence,
            current_metrics.to_vec(),
            Self::recommendation_for(impact_level),
        );

        self.evidence.append(
            EVIDENCE_STREAM,
            "impact_assessed",
            EvidenceValue::map()
                .with("assessment_id", assessment.assessment_id.to_string())
                .with("impact_level", assessment.impact_level.as_str())
                .with("estimated_loss", assessment.estimated_loss.to_string())
                .with("forensic_hash", assessment.forensic_hash.clone()),
        );

        assessment
    }

    async fn establish_baseline(&self, hours_back: u32) -> BaselineSummary {
        let start = Utc::now() - Duration::hours(i64::from(hours_back));
        let samples = (usize::try_from(hours_back).unwrap_or(24) * 4).max(60);
        let baseline_pnl = self
            .thresholds
            .baseline_revenue_per_minute
            .to_f64()
            .unwrap_or(1000.0);

        for i in 0..samples {
            let offset = Duration::seconds(
                (i as i64) * i64::from(hours_back) * 3600 / samples as i64,
            );
            let timestamp = start + offset;

            // Baselines seed at the configured operating point so a
            // system exactly at baseline registers zero adverse
            // deviation.
            self.baselines
                .record("trading_pnl_per_minute", baseline_pnl, timestamp);
            self.baselines
                .record("commission_revenue_per_minute", 200.0, timestamp);
            self.baselines.record("latency_impact_loss", 0.0, timestamp);
            self.baselines.record("error_impact_loss", 0.0, timestamp);
            self.baselines
                .record("execution_quality_score", 98.0, timestamp);
        }

        let mut summary = BaselineSummary {
            hours_back,
            ..Default::default()
        };
        for metric in [
            "trading_pnl_per_minute",
            "commission_revenue_per_minute",
            "latency_impact_loss",
            "error_impact_loss",
            "execution_quality_score",
        ] {
            if let Some(baseline) = self.baselines.baseline(metric) {
                summary.metrics.insert(
                    metric.to_string(),
                    BaselineSummaryEntry {
                        mean: baseline.mean,
                        std_dev: baseline.std_dev,
                        p95: baseline.p95,
                        p99: baseline.p99,
                        sample_count: baseline.sample_count,
                        min_value: baseline.min_value,
                        max_value: baseline.max_value,
                    },
                );
            }
        }

        self.evidence.append(
            EVIDENCE_STREAM,
            "baseline_established",
            EvidenceValue::map()
                .with("collector", self.name.clone())
                .with("hours_back", f64::from(hours_back))
                .with("metrics", summary.metrics.len()),
        );

        summary
    }
}
