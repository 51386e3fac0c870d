//! Rollback decision types.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_evidence::{EvidenceValue, sha256_hex};
use vigil_metrics::BusinessImpactAssessment;

/// How urgently a rollback is needed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RollbackUrgency {
    /// No action needed.
    None,
    /// Monitor only.
    Low,
    /// Plan a response.
    Medium,
    /// Respond this cycle.
    High,
    /// Respond now.
    Urgent,
    /// Respond now, with priority over everything else.
    Immediate,
    /// All-hands response.
    Emergency,
}

impl RollbackUrgency {
    /// Returns the urgency as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
            Self::Immediate => "IMMEDIATE",
            Self::Emergency => "EMERGENCY",
        }
    }

    /// The next urgency up, saturating at Emergency.
    #[must_use]
    pub const fn escalated(&self) -> Self {
        match self {
            Self::None => Self::Low,
            Self::Low => Self::Medium,
            Self::Medium => Self::High,
            Self::High => Self::Urgent,
            Self::Urgent => Self::Immediate,
            Self::Immediate | Self::Emergency => Self::Emergency,
        }
    }
}

impl std::fmt::Display for RollbackUrgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A policy verdict turning an impact assessment into a recommended
/// action with urgency, justification, and forensic binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackDecision {
    /// Unique decision id.
    pub decision_id: Uuid,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Whether a rollback is recommended.
    pub rollback_recommended: bool,
    /// How urgently to act.
    pub urgency: RollbackUrgency,
    /// The assessment that justified the decision.
    pub business_impact: BusinessImpactAssessment,
    /// Human-readable justification.
    pub justification: String,
    /// Snapshot of the policy inputs.
    pub evidence: EvidenceValue,
    /// Who made the decision.
    pub decision_maker: String,
    /// SHA-256 binding identity, urgency, loss, level, and trigger.
    pub forensic_hash: String,
}

impl RollbackDecision {
    /// Creates a decision, computing its forensic hash.
    #[must_use]
    pub fn new(
        rollback_recommended: bool,
        urgency: RollbackUrgency,
        business_impact: BusinessImpactAssessment,
        justification: impl Into<String>,
        evidence: EvidenceValue,
    ) -> Self {
        let mut decision = Self {
            decision_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            rollback_recommended,
            urgency,
            business_impact,
            justification: justification.into(),
            evidence,
            decision_maker: "automated_system".to_string(),
            forensic_hash: String::new(),
        };
        decision.forensic_hash = compute_decision_hash(&decision);
        decision
    }

    /// Sets a non-default decision maker.
    #[must_use]
    pub fn with_decision_maker(mut self, decision_maker: impl Into<String>) -> Self {
        self.decision_maker = decision_maker.into();
        self.forensic_hash = compute_decision_hash(&self);
        self
    }

    /// Recomputes the forensic hash and compares it to the stored one.
    #[must_use]
    pub fn verify_integrity(&self) -> bool {
        compute_decision_hash(self) == self.forensic_hash
    }
}

fn compute_decision_hash(decision: &RollbackDecision) -> String {
    let content = EvidenceValue::map()
        .with("decision_id", decision.decision_id.to_string())
        .with(
            "timestamp",
            decision
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .with("rollback_recommended", decision.rollback_recommended)
        .with("urgency", decision.urgency.as_str())
        .with(
            "estimated_loss",
            decision.business_impact.estimated_loss.to_string(),
        )
        .with("impact_level", decision.business_impact.impact_level.as_str())
        .with(
            "trigger_type",
            decision.business_impact.trigger_type.as_str(),
        );
    sha256_hex(&content.canonical_json())
}
