//! Pharma manufacturing efficiency collector.
//!
//! Observes a manufacturing line's efficiency and environmental
//! parameters. Efficiency shortfall against the GMP floor is priced per
//! percentage point; environmental excursions are compliance violations
//! regardless of their monetary size.

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
};

/// Evidence stream for pharma collection events.
const EVIDENCE_STREAM: &str = "collectors/pharma";

/// Acceptable range for one environmental parameter.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParameterRange {
    /// Lower acceptable bound.
    pub min: f64,
    /// Upper acceptable bound.
    pub max: f64,
}

impl ParameterRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns true when the value is inside the range.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Thresholds for the manufacturing collector.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PharmaThresholds {
    /// Minimum acceptable line efficiency, percent.
    pub efficiency_floor_percent: f64,
    /// Cost per percentage point of efficiency shortfall.
    pub efficiency_cost_per_point: Decimal,
    /// Acceptable temperature range, Celsius.
    pub temperature_celsius: ParameterRange,
    /// Acceptable pressure range, bar.
    pub pressure_bar: ParameterRange,
    /// Acceptable relative humidity range, percent.
    pub humidity_percent: ParameterRange,
    /// Maximum acceptable particle count per cubic meter.
    pub particle_count_limit: f64,
}

impl Default for PharmaThresholds {
    fn default() -> Self {
        Self {
            efficiency_floor_percent: 98.0,
            efficiency_cost_per_point: Decimal::from(500),
            temperature_celsius: ParameterRange::new(18.0, 25.0),
            pressure_bar: ParameterRange::new(0.8, 2.5),
            humidity_percent: ParameterRange::new(40.0, 60.0),
            particle_count_limit: 3_520.0,
        }
    }
}

/// One observation of the manufacturing line.
#[derive(Debug, Clone, PartialEq)]
pub struct ManufacturingSnapshot {
    /// Line efficiency, percent.
    pub efficiency_percent: Decimal,
    /// Clean-room temperature, Celsius.
    pub temperature_celsius: f64,
    /// Line pressure, bar.
    pub pressure_bar: f64,
    /// Relative humidity, percent.
    pub humidity_percent: f64,
    /// Particle count per cubic meter.
    pub particle_count_per_m3: f64,
}

impl ManufacturingSnapshot {
    /// A snapshot of a line operating at its normal envelope.
    #[must_use]
    pub fn nominal() -> Self {
        Self {
            // Slightly above the seeded baseline so a nominal line never
            // registers an adverse deviation.
            efficiency_percent: Decimal::new(985, 1),
            temperature_celsius: 21.5,
            pressure_bar: 1.5,
            humidity_percent: 48.0,
            particle_count_per_m3: 1_800.0,
        }
    }
}

/// Source of manufacturing observations.
#[async_trait]
pub trait ManufacturingDataSource: Send + Sync {
    /// Produces the current observation.
    async fn snapshot(&self) -> anyhow::Result<ManufacturingSnapshot>;
}

/// Simulated line with mild sensor noise.
#[derive(Debug)]
pub struct SimulatedManufacturingSource {
    rng: Mutex<StdRng>,
}

impl SimulatedManufacturingSource {
    /// Creates a seeded simulated source.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl ManufacturingDataSource for SimulatedManufacturingSource {
    async fn snapshot(&self) -> anyhow::Result<ManufacturingSnapshot> {
        let mut rng = self.rng.lock();
        Ok(ManufacturingSnapshot {
            efficiency_percent: Decimal::from_f64(98.4 + rng.gen_range(-0.4..0.4))
                .unwrap_or_default(),
            temperature_celsius: 21.5 + rng.gen_range(-1.0..1.0),
            pressure_bar: 1.5 + rng.gen_range(-0.2..0.2),
            humidity_percent: 48.0 + rng.gen_range(-3.0..3.0),
            particle_count_per_m3: 1_800.0 + rng.gen_range(-300.0..300.0),
        })
    }
}

/// Fixed source for tests and dry runs.
#[derive(Debug, Clone)]
pub struct FixedManufacturingSource {
    snapshot: ManufacturingSnapshot,
}

impl FixedManufacturingSource {
    /// Creates a source that always returns the given snapshot.
    #[must_use]
    pub const fn new(snapshot: ManufacturingSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl ManufacturingDataSource for FixedManufacturingSource {
    async fn snapshot(&self) -> anyhow::Result<ManufacturingSnapshot> {
        Ok(self.snapshot.clone())
    }
}

/// Business-metric collector for the pharma manufacturing demo system.
pub struct ManufacturingEfficiencyCollector {
    name: String,
    deployment_id: String,
    thresholds: PharmaThresholds,
    source: Arc<dyn ManufacturingDataSource>,
    baselines: BaselineStore,
    evidence: EvidenceLog,
    assessor: ImpactAssessor,
}

impl ManufacturingEfficiencyCollector {
    /// Creates a collector wired to the shared baseline store and
    /// evidence log.
    #[must_use]
    pub fn new(
        deployment_id: impl Into<String>,
        thresholds: PharmaThresholds,
        source: Arc<dyn ManufacturingDataSource>,
        baselines: BaselineStore,
        evidence: EvidenceLog,
    ) -> Self {
        let assessor = ImpactAssessor::new().with_rule(
            "manufacturing_efficiency",
            MetricImpactRule::lower_is_worse(
                thresholds.efficiency_cost_per_point,
                TriggerType::EfficiencyDrop,
            ),
        );

        Self {
            name: "pharma_manufacturing".to_string(),
            deployment_id: deployment_id.into(),
            thresholds,
            source,
            baselines,
            evidence,
            assessor,
        }
    }

    /// Collects out-of-range environmental parameters from a metric batch.
    fn parameter_deviations(&self, metrics: &[BusinessMetric]) -> Vec<EvidenceValue> {
        let mut deviations = Vec::new();

        for metric in metrics {
            let value = metric.value.to_f64().unwrap_or(0.0);
            let violation = match metric.name.as_str() {
                "line_temperature_celsius" => (!self
                    .thresholds
                    .temperature_celsius
                    .contains(value))
                .then(|| ("temperature", self.thresholds.temperature_celsius)),
                "line_pressure_bar" => (!self.thresholds.pressure_bar.contains(value))
                    .then(|| ("pressure", self.thresholds.pressure_bar)),
                "line_humidity_percent" => (!self.thresholds.humidity_percent.contains(value))
                    .then(|| ("humidity", self.thresholds.humidity_percent)),
                "particle_count_per_m3" => (value > self.thresholds.particle_count_limit)
                    .then(|| {
                        (
                            "particle_count",
                            ParameterRange::new(0.0, self.thresholds.particle_count_limit),
                        )
                    }),
                _ => None,
            };

            if let Some((parameter, range)) = violation {
                deviations.push(
                    EvidenceValue::map()
                        .with("parameter", parameter)
                        .with("current_value", value)
                        .with("acceptable_min", range.min)
                        .with("acceptable_max", range.max),
                );
            }
        }

        deviations
    }
}

#[async_trait]
impl MetricsCollector for ManufacturingEfficiencyCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect_metrics(&self) -> Vec<BusinessMetric> {
        let snapshot = match self.source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(collector = %self.name, %error, "manufacturing snapshot failed");
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

        vec![
            BusinessMetric::builder("manufacturing_efficiency", snapshot.efficiency_percent)
                .unit("percent")
                .source(MetricSource::Live)
                .metadata("floor_percent", self.thresholds.efficiency_floor_percent.to_string())
                .build(),
            BusinessMetric::builder(
                "line_temperature_celsius",
                Decimal::from_f64(snapshot.temperature_celsius).unwrap_or_default(),
            )
            .unit("celsius")
            .source(MetricSource::Live)
            .build(),
            BusinessMetric::builder(
                "line_pressure_bar",
                Decimal::from_f64(snapshot.pressure_bar).unwrap_or_default(),
            )
            .unit("bar")
            .source(MetricSource::Live)
            .build(),
            BusinessMetric::builder(
                "line_humidity_percent",
                Decimal::from_f64(snapshot.humidity_percent).unwrap_or_default(),
            )
            .unit("percent")
            .source(MetricSource::Live)
            .build(),
            BusinessMetric::builder(
                "particle_count_per_m3",
                Decimal::from_f64(snapshot.particle_count_per_m3).unwrap_or_default(),
            )
            .unit("per_m3")
            .source(MetricSource::Live)
            .build(),
        ]
    }

    fn calculate_impact(&self, current_metrics: &[BusinessMetric]) -> BusinessImpactAssessment {
        if current_metrics.is_empty() {
            return BusinessImpactAssessment::none(&self.deployment_id);
        }

        let computation = self.assessor.compute(current_metrics, &self.baselines);
        let deviations = self.parameter_deviations(current_metrics);

        // Environmental excursions are compliance violations regardless of
        // their monetary size.
        let (impact_level, trigger_type) = if deviations.is_empty() {
            (computation.impact_level, computation.trigger_type)
        } else {
            (
                computation.impact_level.max(ImpactLevel::High),
                TriggerType::ComplianceViolation,
            )
        };

        let recommendation = match (deviations.is_empty(), impact_level) {
            (false, _) => {
                "Environmental parameters out of validated range. \
                 Rollback and quality review required."
            }
            (true, ImpactLevel::Catastrophic | ImpactLevel::Critical) => {
                "Line efficiency far below GMP floor. Immediate rollback recommended."
            }
            (true, ImpactLevel::High | ImpactLevel::Medium) => {
                "Line efficiency below floor. Rollback recommended."
            }
            (true, _) => "Line operating within validated envelope.",
        };

        let evidence = computation
            .to_evidence()
            .with("parameter_deviations", EvidenceValue::Seq(deviations))
            .with(
                "efficiency_floor_percent",
                self.thresholds.efficiency_floor_percent,
            );

        let assessment = BusinessImpactAssessment::new(
            &self.deployment_id,
            impact_level,
            computation.total_loss,
            computation.confidence,
            trigger_type,
            evidence,
            current_metrics.to_vec(),
            recommendation,
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

        for i in 0..samples {
            let offset = Duration::seconds(
                (i as i64) * i64::from(hours_back) * 3600 / samples as i64,
            );
            let timestamp = start + offset;

            // Validated operating point; a nominal line registers zero
            // adverse deviation against it.
            self.baselines
                .record("manufacturing_efficiency", 98.3, timestamp);
            self.baselines
                .record("line_temperature_celsius", 21.5, timestamp);
            self.baselines.record("line_pressure_bar", 1.5, timestamp);
            self.baselines
                .record("line_humidity_percent", 48.0, timestamp);
            self.baselines
                .record("particle_count_per_m3", 1_800.0, timestamp);
        }

        let mut summary = BaselineSummary {
            hours_back,
            ..Default::default()
        };
        for metric in [
            "manufacturing_efficiency",
            "line_temperature_celsius",
            "line_pressure_bar",
            "line_humidity_percent",
            "particle_count_per_m3",
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
