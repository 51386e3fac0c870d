//! Business metric collection and impact assessment for the Vigil platform.
//!
//! This crate defines the pluggable collector contract and the shared
//! logic that turns observed metric deviations into quantified monetary
//! impact:
//!
//! - **Typed Metrics**: [`BusinessMetric`] carries decimal values,
//!   provenance, confidence, and a construction-time integrity hash
//! - **Collector Contract**: [`MetricsCollector`] for industry plugins;
//!   failure degrades to an empty batch, never an error
//! - **Impact Assessment**: [`ImpactAssessor`] prices adverse deviations
//!   with collector-supplied rules and classifies the result by percent
//!   change and absolute loss
//! - **Cycle Aggregation**: [`OverallImpact`] folds per-collector
//!   assessments into one verdict for the decision engine
//!
//! Monetary quantities are `rust_decimal::Decimal` end to end.

pub mod collector;
pub mod impact;
pub mod types;

pub use collector::MetricsCollector;
pub use impact::{
    ImpactAssessor, ImpactComputation, MetricContribution, MetricImpactRule, OverallImpact,
    classify_impact, metric_confidence,
};
pub use types::{
    BaselineSummary, BaselineSummaryEntry, BusinessImpactAssessment, BusinessMetric,
    BusinessMetricBuilder, ImpactLevel, MetricSource, TriggerType,
};
