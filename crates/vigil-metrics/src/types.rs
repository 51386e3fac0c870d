//! Business metric and impact assessment types.
//!
//! Monetary values use arbitrary-precision decimals throughout; floating
//! point never touches money.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_evidence::{EvidenceValue, sha256_hex};

/// Where a metric value came from, determining its base reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricSource {
    /// Read directly from a live system.
    Live,
    /// Derived from other observed values.
    Calculated,
    /// Projected or modeled.
    Estimated,
}

impl MetricSource {
    /// Static reliability factor used in confidence scoring.
    #[must_use]
    pub const fn reliability(&self) -> f64 {
        match self {
            Self::Live => 0.95,
            Self::Calculated => 0.80,
            Self::Estimated => 0.70,
        }
    }

    /// Returns the source as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Calculated => "calculated",
            Self::Estimated => "estimated",
        }
    }
}

/// One observed business metric with forensic metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessMetric {
    /// Metric name (e.g. `trading_pnl_per_minute`).
    pub name: String,
    /// Observed value.
    pub value: Decimal,
    /// When the value was observed.
    pub timestamp: DateTime<Utc>,
    /// ISO currency code for monetary metrics.
    pub currency: Option<String>,
    /// Unit for non-monetary metrics.
    pub unit: Option<String>,
    /// Origin of the value.
    pub source: MetricSource,
    /// Collector-assigned confidence in `[0, 1]`.
    pub confidence: f64,
    /// Free-form metadata.
    pub metadata: BTreeMap<String, String>,
    /// SHA-256 over the identifying fields, computed at construction.
    pub hash: String,
}

impl BusinessMetric {
    /// Starts building a metric.
    #[must_use]
    pub fn builder(name: impl Into<String>, value: Decimal) -> BusinessMetricBuilder {
        BusinessMetricBuilder::new(name, value)
    }

    /// Recomputes the hash and compares it to the stored one.
    #[must_use]
    pub fn verify_integrity(&self) -> bool {
        compute_metric_hash(self) == self.hash
    }

    /// Age of the observation relative to `now`.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }
}

fn compute_metric_hash(metric: &BusinessMetric) -> String {
    let content = EvidenceValue::map()
        .with("name", metric.name.clone())
        .with("value", metric.value.to_string())
        .with(
            "timestamp",
            metric.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .with(
            "currency",
            metric
                .currency
                .clone()
                .map_or(EvidenceValue::Null, EvidenceValue::String),
        )
        .with(
            "unit",
            metric
                .unit
                .clone()
                .map_or(EvidenceValue::Null, EvidenceValue::String),
        )
        .with("source", metric.source.as_str());
    sha256_hex(&content.canonical_json())
}

/// Builder for [`BusinessMetric`].
#[derive(Debug)]
pub struct BusinessMetricBuilder {
    name: String,
    value: Decimal,
    timestamp: DateTime<Utc>,
    currency: Option<String>,
    unit: Option<String>,
    source: MetricSource,
    confidence: f64,
    metadata: BTreeMap<String, String>,
}

impl BusinessMetricBuilder {
    fn new(name: impl Into<String>, value: Decimal) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: Utc::now(),
            currency: None,
            unit: None,
            source: MetricSource::Live,
            confidence: 1.0,
            metadata: BTreeMap::new(),
        }
    }

    /// Sets an explicit observation timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the currency code.
    #[must_use]
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Sets the unit.
    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the source.
    #[must_use]
    pub const fn source(mut self, source: MetricSource) -> Self {
        self.source = source;
        self
    }

    /// Sets the collector confidence.
    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Finalizes the metric, computing its hash.
    #[must_use]
    pub fn build(self) -> BusinessMetric {
        let mut metric = BusinessMetric {
            name: self.name,
            value: self.value,
            timestamp: self.timestamp,
            currency: self.currency,
            unit: self.unit,
            source: self.source,
            confidence: self.confidence,
            metadata: self.metadata,
            hash: String::new(),
        };
        metric.hash = compute_metric_hash(&metric);
        metric
    }
}

/// Business impact severity levels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ImpactLevel {
    /// No measurable impact.
    None,
    /// Minor impact.
    Low,
    /// Noticeable impact.
    Medium,
    /// Serious impact.
    High,
    /// Severe impact requiring immediate action.
    Critical,
    /// Existential impact.
    Catastrophic,
}

impl ImpactLevel {
    /// Returns the level as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
            Self::Catastrophic => "CATASTROPHIC",
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of degradation triggered an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    /// Revenue below baseline.
    RevenueLoss,
    /// Operational efficiency below its floor.
    EfficiencyDrop,
    /// Elevated error rates.
    ErrorRateSpike,
    /// Degraded latency.
    LatencyDegradation,
    /// A regulated parameter out of range.
    ComplianceViolation,
    /// Direct customer-facing harm.
    CustomerImpact,
    /// A security-relevant event.
    SecurityIncident,
}

impl TriggerType {
    /// Returns the trigger as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RevenueLoss => "REVENUE_LOSS",
            Self::EfficiencyDrop => "EFFICIENCY_DROP",
            Self::ErrorRateSpike => "ERROR_RATE_SPIKE",
            Self::LatencyDegradation => "LATENCY_DEGRADATION",
            Self::ComplianceViolation => "COMPLIANCE_VIOLATION",
            Self::CustomerImpact => "CUSTOMER_IMPACT",
            Self::SecurityIncident => "SECURITY_INCIDENT",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Quantified, confidence-bounded statement of business harm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessImpactAssessment {
    /// Unique assessment id.
    pub assessment_id: Uuid,
    /// When the assessment was produced.
    pub timestamp: DateTime<Utc>,
    /// The deployment under evaluation.
    pub deployment_id: String,
    /// Classified impact level.
    pub impact_level: ImpactLevel,
    /// Estimated monetary loss (never negative).
    pub estimated_loss: Decimal,
    /// Confidence in the assessment, in `[0, 1]`.
    pub confidence: f64,
    /// The dominant trigger category.
    pub trigger_type: TriggerType,
    /// Structured supporting evidence.
    pub evidence: EvidenceValue,
    /// The metrics the assessment was derived from.
    pub metrics: Vec<BusinessMetric>,
    /// Human-readable recommendation.
    pub recommendation: String,
    /// SHA-256 binding identity, level, loss, and trigger.
    pub forensic_hash: String,
}

impl BusinessImpactAssessment {
    /// Creates an assessment, computing its forensic hash.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deployment_id: impl Into<String>,
        impact_level: ImpactLevel,
        estimated_loss: Decimal,
        confidence: f64,
        trigger_type: TriggerType,
        evidence: EvidenceValue,
        metrics: Vec<BusinessMetric>,
        recommendation: impl Into<String>,
    ) -> Self {
        let mut assessment = Self {
            assessment_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            deployment_id: deployment_id.into(),
            impact_level,
            estimated_loss: estimated_loss.max(Decimal::ZERO),
            confidence: confidence.clamp(0.0, 1.0),
            trigger_type,
            evidence,
            metrics,
            recommendation: recommendation.into(),
            forensic_hash: String::new(),
        };
        assessment.forensic_hash = compute_assessment_hash(&assessment);
        assessment
    }

    /// A no-impact assessment, used when a collector has nothing to report.
    #[must_use]
    pub fn none(deployment_id: impl Into<String>) -> Self {
        Self::new(
            deployment_id,
            ImpactLevel::None,
            Decimal::ZERO,
            0.0,
            TriggerType::RevenueLoss,
            EvidenceValue::map().with("reason", "no metrics collected"),
            Vec::new(),
            "No business metrics available; no action required.",
        )
    }

    /// Recomputes the forensic hash and compares it to the stored one.
    #[must_use]
    pub fn verify_integrity(&self) -> bool {
        compute_assessment_hash(self) == self.forensic_hash
    }
}

fn compute_assessment_hash(assessment: &BusinessImpactAssessment) -> String {
    let content = EvidenceValue::map()
        .with("assessment_id", assessment.assessment_id.to_string())
        .with(
            "timestamp",
            assessment
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .with("deployment_id", assessment.deployment_id.clone())
        .with("impact_level", assessment.impact_level.as_str())
        .with("estimated_loss", assessment.estimated_loss.to_string())
        .with("trigger_type", assessment.trigger_type.as_str())
        .with("metrics_count", assessment.metrics.len());
    sha256_hex(&content.canonical_json())
}

/// Summary statistics a collector derives when establishing its baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BaselineSummary {
    /// Per-metric summary entries.
    pub metrics: BTreeMap<String, BaselineSummaryEntry>,
    /// Hours of history the baseline covers.
    pub hours_back: u32,
}

/// Summary statistics for one metric's established baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSummaryEntry {
    /// Mean over the seeded history.
    pub mean: f64,
    /// Standard deviation over the seeded history.
    pub std_dev: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
    /// Number of seeded samples.
    pub sample_count: usize,
    /// Smallest seeded value.
    pub min_value: f64,
    /// Largest seeded value.
    pub max_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(value: i64) -> BusinessMetric {
        BusinessMetric::builder("trading_pnl_per_minute", Decimal::from(value))
            .currency("USD")
            .source(MetricSource::Live)
            .build()
    }

    mod metric_tests {
        use super::*;

        #[test]
        fn fresh_metric_verifies() {
            assert!(metric(1000).verify_integrity());
        }

        #[test]
        fn mutated_value_fails_verification() {
            let mut m = metric(1000);
            m.value = Decimal::from(5);
            assert!(!m.verify_integrity());
        }

        #[test]
        fn confidence_is_clamped() {
            let m = BusinessMetric::builder("m", Decimal::ONE)
                .confidence(7.0)
                .build();
            assert!((m.confidence - 1.0).abs() < f64::EPSILON);
        }

        #[test]
        fn source_reliability_table() {
            assert!((MetricSource::Live.reliability() - 0.95).abs() < f64::EPSILON);
            assert!((MetricSource::Calculated.reliability() - 0.80).abs() < f64::EPSILON);
            assert!((MetricSource::Estimated.reliability() - 0.70).abs() < f64::EPSILON);
        }
    }

    mod impact_level_tests {
        use super::*;

        #[test]
        fn levels_order_by_severity() {
            assert!(ImpactLevel::None < ImpactLevel::Low);
            assert!(ImpactLevel::High < ImpactLevel::Critical);
            assert!(ImpactLevel::Critical < ImpactLevel::Catastrophic);
        }

        #[test]
        fn serde_uses_uppercase() {
            let json = serde_json::to_string(&ImpactLevel::Catastrophic).unwrap_or_default();
            assert_eq!(json, "\"CATASTROPHIC\"");
        }
    }

    mod assessment_tests {
        use super::*;

        #[test]
        fn fresh_assessment_verifies() {
            let assessment = BusinessImpactAssessment::new(
                "deploy-7",
                ImpactLevel::High,
                Decimal::from(12_000),
                0.9,
                TriggerType::RevenueLoss,
                EvidenceValue::map().with("deviation", 12_000.0),
                vec![metric(-9000)],
                "Rollback recommended",
            );
            assert!(assessment.verify_integrity());
        }

        #[test]
        fn mutated_loss_fails_verification() {
            let mut assessment = BusinessImpactAssessment::new(
                "deploy-7",
                ImpactLevel::High,
                Decimal::from(12_000),
                0.9,
                TriggerType::RevenueLoss,
                EvidenceValue::map(),
                Vec::new(),
                "Rollback recommended",
            );
            assessment.estimated_loss = Decimal::ZERO;
            assert!(!assessment.verify_integrity());
        }

        #[test]
        fn negative_loss_is_floored_at_zero() {
            let assessment = BusinessImpactAssessment::new(
                "deploy-7",
                ImpactLevel::None,
                Decimal::from(-500),
                0.5,
                TriggerType::RevenueLoss,
                EvidenceValue::map(),
                Vec::new(),
                "No action",
            );
            assert_eq!(assessment.estimated_loss, Decimal::ZERO);
        }

        #[test]
        fn none_assessment_has_zero_loss_and_confidence() {
            let assessment = BusinessImpactAssessment::none("deploy-7");
            assert_eq!(assessment.impact_level, ImpactLevel::None);
            assert_eq!(assessment.estimated_loss, Decimal::ZERO);
            assert!(assessment.confidence.abs() < f64::EPSILON);
        }
    }
}
