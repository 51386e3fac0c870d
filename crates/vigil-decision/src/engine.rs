//! The rollback decision engine.
//!
//! Applies the urgency policy ladder to an aggregated impact, layers the
//! forcing rules on top, and gates the recommendation on confidence.
//! Every decision, positive or negative, is appended to the evidence
//! stream with its policy inputs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use vigil_evidence::{EvidenceLog, EvidenceValue};
use vigil_metrics::{BusinessImpactAssessment, ImpactLevel, OverallImpact, TriggerType};

use crate::types::{RollbackDecision, RollbackUrgency};

/// Evidence stream decisions are appended to.
const EVIDENCE_STREAM: &str = "decisions";

/// Configuration for the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Minimum confidence for a recommendation to stand.
    pub confidence_threshold: f64,
    /// Confidence floor for the compliance/security forcing rule.
    pub forced_trigger_confidence_floor: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            forced_trigger_confidence_floor: 0.5,
        }
    }
}

/// Applies rollback policy to impact assessments.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: DecisionConfig,
    evidence: EvidenceLog,
}

impl DecisionEngine {
    /// Creates an engine writing to the given evidence log.
    #[must_use]
    pub fn new(config: DecisionConfig, evidence: EvidenceLog) -> Self {
        Self { config, evidence }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Evaluates one cycle's assessments into a decision.
    ///
    /// `ancillary_evidence` carries probe-derived health context; it is
    /// recorded with the decision but does not change the policy outcome.
    #[must_use]
    pub fn decide(
        &self,
        overall: &OverallImpact,
        assessments: &[BusinessImpactAssessment],
        ancillary_evidence: EvidenceValue,
    ) -> RollbackDecision {
        let mut reasons = Vec::new();

        // Urgency ladder: first match wins.
        let mut urgency = ladder_urgency(overall.impact_level, overall.total_estimated_loss);
        if urgency >= RollbackUrgency::High {
            reasons.push(format!(
                "impact level {} with estimated loss ${}",
                overall.impact_level, overall.total_estimated_loss
            ));
        }

        // Forcing rule: compliance or security triggers with sufficient
        // confidence demand an immediate response.
        let forced = assessments.iter().any(|a| {
            matches!(
                a.trigger_type,
                TriggerType::ComplianceViolation | TriggerType::SecurityIncident
            ) && a.confidence >= self.config.forced_trigger_confidence_floor
        });
        if forced {
            urgency = urgency.max(RollbackUrgency::Immediate);
            reasons.push("compliance or security trigger present".to_string());
        }

        // Escalation rule: concurrent high-impact reports from distinct
        // collectors raise the stakes one level.
        let high_impact_systems = assessments
            .iter()
            .filter(|a| a.impact_level >= ImpactLevel::High)
            .count();
        if high_impact_systems >= 2 {
            urgency = urgency.escalated();
            reasons.push(format!(
                "{high_impact_systems} systems report high impact in the same cycle"
            ));
        }

        let confidence_met = overall.confidence >= self.config.confidence_threshold;
        let forced_confidence_met = forced;
        let rollback_recommended =
            (urgency >= RollbackUrgency::High && confidence_met) || forced_confidence_met;

        if urgency >= RollbackUrgency::High && !confidence_met && !forced {
            reasons.push(format!(
                "confidence {:.2} below threshold {:.2}; recommendation withheld",
                overall.confidence, self.config.confidence_threshold
            ));
        }

        let business_impact = dominant_assessment(assessments)
            .cloned()
            .unwrap_or_else(|| BusinessImpactAssessment::none("unknown"));

        let justification = build_justification(overall, urgency, rollback_recommended, &reasons);

        let evidence = EvidenceValue::map()
            .with("overall_impact", overall.to_evidence())
            .with(
                "reasons",
                EvidenceValue::Seq(
                    reasons.iter().map(|r| EvidenceValue::from(r.clone())).collect(),
                ),
            )
            .with("forced_trigger", forced)
            .with("high_impact_systems", high_impact_systems)
            .with("confidence_threshold", self.config.confidence_threshold)
            .with("system_health", ancillary_evidence);

        let decision = RollbackDecision::new(
            rollback_recommended,
            urgency,
            business_impact,
            justification,
            evidence,
        );

        info!(
            decision_id = %decision.decision_id,
            urgency = %decision.urgency,
            recommended = decision.rollback_recommended,
            estimated_loss = %decision.business_impact.estimated_loss,
            "rollback decision made"
        );

        self.evidence.append(
            EVIDENCE_STREAM,
            "rollback_decision_made",
            EvidenceValue::map()
                .with("decision_id", decision.decision_id.to_string())
                .with("rollback_recommended", decision.rollback_recommended)
                .with("urgency", decision.urgency.as_str())
                .with("impact_level", overall.impact_level.as_str())
                .with(
                    "estimated_loss",
                    overall.total_estimated_loss.to_string(),
                )
                .with("confidence", overall.confidence)
                .with("forensic_hash", decision.forensic_hash.clone()),
        );

        decision
    }

    /// Records that a positive decision was suppressed by policy rather
    /// than executed.
    pub fn record_suppression(&self, decision: &RollbackDecision, reason: &str) {
        self.evidence.append(
            EVIDENCE_STREAM,
            "rollback_decision_suppressed",
            EvidenceValue::map()
                .with("decision_id", decision.decision_id.to_string())
                .with("reason", reason),
        );
    }
}

/// The urgency policy ladder; first match wins.
fn ladder_urgency(level: ImpactLevel, loss: Decimal) -> RollbackUrgency {
    if level == ImpactLevel::Catastrophic || loss >= Decimal::from(1_000_000) {
        RollbackUrgency::Emergency
    } else if level == ImpactLevel::Critical || loss >= Decimal::from(100_000) {
        RollbackUrgency::Immediate
    } else if level == ImpactLevel::High || loss >= Decimal::from(10_000) {
        RollbackUrgency::Urgent
    } else if level == ImpactLevel::Medium || loss >= Decimal::from(1_000) {
        RollbackUrgency::High
    } else if level == ImpactLevel::Low {
        RollbackUrgency::Medium
    } else {
        RollbackUrgency::Low
    }
}

/// Picks the assessment that justifies the decision: highest level, then
/// largest loss.
fn dominant_assessment(
    assessments: &[BusinessImpactAssessment],
) -> Option<&BusinessImpactAssessment> {
    assessments
        .iter()
        .max_by_key(|a| (a.impact_level, a.estimated_loss))
}

fn build_justification(
    overall: &OverallImpact,
    urgency: RollbackUrgency,
    recommended: bool,
    reasons: &[String],
) -> String {
    let reason_lines: String = reasons
        .iter()
        .map(|r| format!("- {r}\n"))
        .collect();

    format!(
        "Impact level: {}\n\
         Estimated loss: ${}\n\
         Confidence: {:.2}\n\
         Urgency: {}\n\
         Recommendation: {}\n\
         Reasons:\n{}",
        overall.impact_level,
        overall.total_estimated_loss,
        overall.confidence,
        urgency,
        if recommended {
            "ROLLBACK RECOMMENDED"
        } else {
            "CONTINUE MONITORING"
        },
        if reason_lines.is_empty() {
            "- impact within acceptable thresholds\n".to_string()
        } else {
            reason_lines
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn assessment(
        level: ImpactLevel,
        loss: i64,
        confidence: f64,
        trigger: TriggerType,
    ) -> BusinessImpactAssessment {
        BusinessImpactAssessment::new(
            "deploy-1",
            level,
            Decimal::from(loss),
            confidence,
            trigger,
            EvidenceValue::map(),
            Vec::new(),
            "test",
        )
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::new(DecisionConfig::default(), EvidenceLog::in_memory())
    }

    fn decide_single(
        level: ImpactLevel,
        loss: i64,
        confidence: f64,
        trigger: TriggerType,
    ) -> RollbackDecision {
        let a = assessment(level, loss, confidence, trigger);
        let overall = OverallImpact::aggregate(std::slice::from_ref(&a));
        engine().decide(&overall, &[a], EvidenceValue::map())
    }

    mod ladder_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(ImpactLevel::Catastrophic, 0, RollbackUrgency::Emergency; "catastrophic level")]
        #[test_case(ImpactLevel::None, 1_000_000, RollbackUrgency::Emergency; "million dollar loss")]
        #[test_case(ImpactLevel::Critical, 0, RollbackUrgency::Immediate; "critical level")]
        #[test_case(ImpactLevel::None, 100_000, RollbackUrgency::Immediate; "hundred k loss")]
        #[test_case(ImpactLevel::High, 0, RollbackUrgency::Urgent; "high level")]
        #[test_case(ImpactLevel::None, 10_000, RollbackUrgency::Urgent; "ten k loss")]
        #[test_case(ImpactLevel::Medium, 0, RollbackUrgency::High; "medium level")]
        #[test_case(ImpactLevel::None, 1_000, RollbackUrgency::High; "one k loss")]
        #[test_case(ImpactLevel::Low, 0, RollbackUrgency::Medium; "low level")]
        #[test_case(ImpactLevel::None, 50, RollbackUrgency::Low; "negligible")]
        fn ladder(level: ImpactLevel, loss: i64, expected: RollbackUrgency) {
            assert_eq!(ladder_urgency(level, Decimal::from(loss)), expected);
        }
    }

    mod recommendation_tests {
        use super::*;

        #[test]
        fn urgent_with_confidence_recommends() {
            let decision =
                decide_single(ImpactLevel::High, 12_000, 0.9, TriggerType::RevenueLoss);
            assert_eq!(decision.urgency, RollbackUrgency::Urgent);
            assert!(decision.rollback_recommended);
        }

        #[test]
        fn urgent_without_confidence_withholds() {
            let decision =
                decide_single(ImpactLevel::High, 12_000, 0.4, TriggerType::RevenueLoss);
            assert_eq!(decision.urgency, RollbackUrgency::Urgent);
            assert!(!decision.rollback_recommended);
            assert!(decision.justification.contains("CONTINUE MONITORING"));
        }

        #[test]
        fn medium_urgency_below_high_never_recommends() {
            let decision = decide_single(ImpactLevel::Low, 0, 1.0, TriggerType::RevenueLoss);
            assert_eq!(decision.urgency, RollbackUrgency::Medium);
            assert!(!decision.rollback_recommended);
        }

        #[test]
        fn every_decision_is_logged() {
            let log = EvidenceLog::in_memory();
            let engine = DecisionEngine::new(DecisionConfig::default(), log.clone());
            let a = assessment(ImpactLevel::None, 0, 0.0, TriggerType::RevenueLoss);
            let overall = OverallImpact::aggregate(std::slice::from_ref(&a));

            let _ = engine.decide(&overall, &[a], EvidenceValue::map());

            assert_eq!(log.stream_len(EVIDENCE_STREAM), 1);
            let events = log.stream_events(EVIDENCE_STREAM);
            assert_eq!(events[0].event_type, "rollback_decision_made");
        }
    }

    mod forcing_tests {
        use super::*;

        #[test]
        fn compliance_violation_forces_immediate() {
            let decision = decide_single(
                ImpactLevel::Low,
                200,
                0.6,
                TriggerType::ComplianceViolation,
            );
            assert_eq!(decision.urgency, RollbackUrgency::Immediate);
            assert!(decision.rollback_recommended);
        }

        #[test]
        fn security_incident_forces_immediate() {
            let decision =
                decide_single(ImpactLevel::Low, 200, 0.7, TriggerType::SecurityIncident);
            assert_eq!(decision.urgency, RollbackUrgency::Immediate);
            assert!(decision.rollback_recommended);
        }

        #[test]
        fn low_confidence_compliance_trigger_does_not_force() {
            let decision = decide_single(
                ImpactLevel::Low,
                200,
                0.3,
                TriggerType::ComplianceViolation,
            );
            assert!(decision.urgency < RollbackUrgency::Immediate);
            assert!(!decision.rollback_recommended);
        }

        #[test]
        fn two_high_impact_systems_escalate_one_level() {
            let a = assessment(ImpactLevel::High, 12_000, 0.9, TriggerType::RevenueLoss);
            let b = assessment(ImpactLevel::High, 15_000, 0.9, TriggerType::EfficiencyDrop);
            let overall = OverallImpact::aggregate(&[a.clone(), b.clone()]);

            let decision = engine().decide(&overall, &[a, b], EvidenceValue::map());

            // Urgent (High level) escalated one step.
            assert_eq!(decision.urgency, RollbackUrgency::Immediate);
        }
    }

    mod totality_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_level() -> impl Strategy<Value = ImpactLevel> {
            prop_oneof![
                Just(ImpactLevel::None),
                Just(ImpactLevel::Low),
                Just(ImpactLevel::Medium),
                Just(ImpactLevel::High),
                Just(ImpactLevel::Critical),
                Just(ImpactLevel::Catastrophic),
            ]
        }

        fn arb_trigger() -> impl Strategy<Value = TriggerType> {
            prop_oneof![
                Just(TriggerType::RevenueLoss),
                Just(TriggerType::EfficiencyDrop),
                Just(TriggerType::ErrorRateSpike),
                Just(TriggerType::LatencyDegradation),
                Just(TriggerType::ComplianceViolation),
                Just(TriggerType::CustomerImpact),
                Just(TriggerType::SecurityIncident),
            ]
        }

        proptest! {
            #[test]
            fn policy_is_total_and_single_valued(
                level in arb_level(),
                loss in 0_i64..5_000_000,
                trigger in arb_trigger(),
                confidence in 0.0_f64..1.0,
            ) {
                let a = assessment(level, loss, confidence, trigger);
                let overall = OverallImpact::aggregate(std::slice::from_ref(&a));
                let engine = engine();

                let first = engine.decide(&overall, std::slice::from_ref(&a), EvidenceValue::map());
                let second = engine.decide(&overall, std::slice::from_ref(&a), EvidenceValue::map());

                // Exactly one urgency per input, stable across evaluations.
                prop_assert_eq!(first.urgency, second.urgency);
                prop_assert_eq!(first.rollback_recommended, second.rollback_recommended);
            }
        }
    }
}
