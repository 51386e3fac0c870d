//! The post-rollback analyzer.
//!
//! Once an execution reaches a terminal state, the analyzer correlates its
//! artifacts with the originating decision and produces findings along six
//! axes: root cause, business impact, rollback performance, communication
//! effectiveness, compliance validation, and lessons learned.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tracing::info;
use vigil_evidence::{EvidenceLog, EvidenceValue};
use vigil_metrics::{ImpactLevel, TriggerType};
use vigil_rollback::{RollbackExecution, StrategyKind};

use crate::types::{AnalysisFinding, AnalysisType, FindingSeverity, PostRollbackReport};

/// Cost model for the analyzer's actual-loss reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Base cost of running any rollback.
    pub base_execution_cost: Decimal,
    /// Cost attributed to each recorded error.
    pub error_recovery_cost: Decimal,
    /// Per-minute loss rate while degraded, by trigger category.
    pub loss_rates_per_minute: BTreeMap<TriggerType, Decimal>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let mut loss_rates_per_minute = BTreeMap::new();
        loss_rates_per_minute.insert(TriggerType::RevenueLoss, Decimal::from(1_000));
        loss_rates_per_minute.insert(TriggerType::EfficiencyDrop, Decimal::from(500));
        loss_rates_per_minute.insert(TriggerType::ErrorRateSpike, Decimal::from(1_000));
        loss_rates_per_minute.insert(TriggerType::LatencyDegradation, Decimal::from(750));
        loss_rates_per_minute.insert(TriggerType::ComplianceViolation, Decimal::from(1_500));
        loss_rates_per_minute.insert(TriggerType::CustomerImpact, Decimal::from(1_000));
        loss_rates_per_minute.insert(TriggerType::SecurityIncident, Decimal::from(2_000));

        Self {
            base_execution_cost: Decimal::from(1_000),
            error_recovery_cost: Decimal::from(500),
            loss_rates_per_minute,
        }
    }
}

impl AnalyzerConfig {
    fn loss_rate(&self, trigger: TriggerType) -> Decimal {
        self.loss_rates_per_minute
            .get(&trigger)
            .copied()
            .unwrap_or_else(|| Decimal::from(1_000))
    }
}

/// Produces post-rollback reports from terminal executions.
#[derive(Debug, Clone)]
pub struct PostRollbackAnalyzer {
    config: AnalyzerConfig,
    evidence: EvidenceLog,
}

impl PostRollbackAnalyzer {
    /// Creates an analyzer reading and writing the shared evidence log.
    #[must_use]
    pub fn new(config: AnalyzerConfig, evidence: EvidenceLog) -> Self {
        Self { config, evidence }
    }

    /// Analyzes a terminal execution into a report.
    ///
    /// The report is hash-bound to the execution's forensic timeline and
    /// its generation is recorded in the evidence log.
    #[must_use]
    pub fn analyze(&self, execution: &RollbackExecution) -> PostRollbackReport {
        let mut findings = Vec::new();
        let mut metrics = BTreeMap::new();

        findings.push(self.analyze_root_cause(execution));
        findings.push(self.analyze_business_impact(execution, &mut metrics));
        findings.push(self.analyze_performance(execution, &mut metrics));
        findings.push(self.analyze_communication(execution));
        findings.push(self.analyze_compliance(execution, &mut metrics));
        findings.push(Self::extract_lessons(execution, &findings));

        let timeline_head = execution
            .forensic_timeline
            .last()
            .map(|e| e.event_hash.as_str());
        let report = PostRollbackReport::assemble(
            execution.execution_id,
            timeline_head,
            findings,
            metrics,
        );

        info!(
            report_id = %report.report_id,
            execution_id = %execution.execution_id,
            findings = report.findings.len(),
            "post-rollback report generated"
        );

        self.evidence.append(
            &format!("rollback/{}", execution.execution_id),
            "post_rollback_report_generated",
            EvidenceValue::map()
                .with("report_id", report.report_id.to_string())
                .with("report_hash", report.report_hash.clone())
                .with("findings", report.findings.len())
                .with(
                    "max_severity",
                    report.max_severity().map_or("none", |s| s.as_str()),
                ),
        );

        report
    }

    /// Root cause: what degraded and how badly.
    fn analyze_root_cause(&self, execution: &RollbackExecution) -> AnalysisFinding {
        let impact = &execution.decision.business_impact;

        let severity = match impact.impact_level {
            ImpactLevel::Catastrophic => FindingSeverity::Critical,
            ImpactLevel::Critical => FindingSeverity::High,
            ImpactLevel::High => FindingSeverity::Medium,
            _ => FindingSeverity::Low,
        };

        let likely_cause = match impact.trigger_type {
            TriggerType::RevenueLoss => "deployment degraded a revenue-generating path",
            TriggerType::EfficiencyDrop => "deployment degraded production throughput",
            TriggerType::ErrorRateSpike => "deployment introduced failing operations",
            TriggerType::LatencyDegradation => "deployment degraded response latency",
            TriggerType::ComplianceViolation => "deployment pushed a regulated parameter out of range",
            TriggerType::CustomerImpact => "deployment degraded customer-facing quality",
            TriggerType::SecurityIncident => "deployment introduced a security exposure",
        };

        AnalysisFinding::new(
            AnalysisType::RootCause,
            severity,
            "Root Cause Analysis",
            format!(
                "Rollback of {} was triggered by {} at impact level {}: {likely_cause}.",
                execution.deployment_id, impact.trigger_type, impact.impact_level
            ),
            EvidenceValue::map()
                .with("trigger_type", impact.trigger_type.as_str())
                .with("impact_level", impact.impact_level.as_str())
                .with("decision_evidence", execution.decision.evidence.clone())
                .with("assessment_hash", impact.forensic_hash.clone()),
        )
        .with_recommendation(
            "Correlate the deployment diff with the degraded metrics before redeploying",
        )
    }

    /// Business impact: estimated vs reconstructed actual loss.
    fn analyze_business_impact(
        &self,
        execution: &RollbackExecution,
        metrics: &mut BTreeMap<String, f64>,
    ) -> AnalysisFinding {
        let estimated = execution.decision.business_impact.estimated_loss;
        let actual = self.actual_loss(execution);

        let accuracy = if estimated > Decimal::ZERO {
            let variance = (actual - estimated).abs() / estimated;
            (Decimal::ONE_HUNDRED
                - (variance * Decimal::ONE_HUNDRED))
                .max(Decimal::ZERO)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };

        metrics.insert("impact_accuracy_percent".to_string(), accuracy);
        metrics.insert(
            "actual_loss".to_string(),
            actual.to_f64().unwrap_or(0.0),
        );

        let severity = if accuracy < 50.0 {
            FindingSeverity::High
        } else if accuracy < 75.0 {
            FindingSeverity::Medium
        } else {
            FindingSeverity::Low
        };

        let assessment_text = if accuracy >= 90.0 {
            "Highly accurate impact estimation"
        } else if accuracy >= 75.0 {
            "Good impact estimation with minor variance"
        } else if accuracy >= 50.0 {
            "Moderate impact estimation accuracy"
        } else {
            "Poor impact estimation requiring improvement"
        };

        let mut finding = AnalysisFinding::new(
            AnalysisType::BusinessImpact,
            severity,
            "Business Impact Variance",
            format!(
                "Estimated ${estimated} against reconstructed actual ${actual}: {assessment_text}."
            ),
            EvidenceValue::map()
                .with("estimated_loss", estimated.to_string())
                .with("actual_loss", actual.to_string())
                .with("accuracy_percent", accuracy),
        );

        if accuracy < 75.0 {
            finding = finding
                .with_recommendation("Review impact estimation models against observed losses")
                .with_recommendation("Recalibrate collector loss multipliers");
        }
        finding
    }

    /// Reconstructed actual loss: degraded time priced at the trigger's
    /// per-minute rate, plus execution cost, plus error recovery cost.
    fn actual_loss(&self, execution: &RollbackExecution) -> Decimal {
        let duration_minutes = execution
            .duration()
            .map_or(0.0, |d| d.num_milliseconds() as f64 / 60_000.0);
        let rate = self
            .config
            .loss_rate(execution.decision.business_impact.trigger_type);
        let degraded_loss =
            Decimal::from_f64(duration_minutes).unwrap_or_default() * rate;

        let strategy_multiplier = match execution.strategy {
            StrategyKind::FullStack => Decimal::from(3),
            StrategyKind::BlueGreen => Decimal::new(15, 1),
            _ => Decimal::ONE,
        };
        let execution_cost = self.config.base_execution_cost * strategy_multiplier;

        let error_cost =
            self.config.error_recovery_cost * Decimal::from(execution.error_log.len());

        degraded_loss + execution_cost + error_cost
    }

    /// Rollback performance: duration score, step success, error penalty.
    fn analyze_performance(
        &self,
        execution: &RollbackExecution,
        metrics: &mut BTreeMap<String, f64>,
    ) -> AnalysisFinding {
        let duration_seconds = execution
            .duration()
            .map_or(0.0, |d| d.num_milliseconds() as f64 / 1000.0);
        let expected = execution.strategy.expected_duration().as_secs_f64();

        let duration_score = if duration_seconds <= expected {
            70.0
        } else if duration_seconds <= expected * 1.5 {
            50.0
        } else {
            30.0
        };

        let total_steps = execution.execution_steps.len();
        let successful_steps = execution.execution_steps.iter().filter(|s| s.success).count();
        let success_rate = if total_steps == 0 {
            0.0
        } else {
            successful_steps as f64 / total_steps as f64 * 100.0
        };

        let error_penalty = (execution.error_log.len() as f64 * 5.0).min(20.0);
        let efficiency = (duration_score + success_rate * 0.3 - error_penalty).max(0.0);

        metrics.insert("rollback_efficiency_score".to_string(), efficiency);
        metrics.insert("rollback_duration_seconds".to_string(), duration_seconds);
        metrics.insert("step_success_rate".to_string(), success_rate);

        let severity = if efficiency < 50.0 {
            FindingSeverity::High
        } else if efficiency < 70.0 {
            FindingSeverity::Medium
        } else {
            FindingSeverity::Low
        };

        let mut finding = AnalysisFinding::new(
            AnalysisType::PerformanceImpact,
            severity,
            "Rollback Execution Performance",
            format!(
                "Rollback executed in {duration_seconds:.1}s with {efficiency:.1}% efficiency \
                 ({successful_steps}/{total_steps} steps succeeded).",
            ),
            EvidenceValue::map()
                .with("duration_seconds", duration_seconds)
                .with("expected_duration_seconds", expected)
                .with("duration_score", duration_score)
                .with("step_success_rate", success_rate)
                .with("error_penalty", error_penalty)
                .with("efficiency_score", efficiency),
        );

        if efficiency < 70.0 {
            finding = finding
                .with_recommendation("Analyze step execution bottlenecks")
                .with_recommendation("Consider a faster rollback strategy for this class of incident");
        }
        if execution.error_log.len() > 2 {
            finding =
                finding.with_recommendation("Investigate and resolve rollback execution errors");
        }
        finding
    }

    /// Communication: notification events recorded on the execution's
    /// evidence stream.
    fn analyze_communication(&self, execution: &RollbackExecution) -> AnalysisFinding {
        let stream = format!("rollback/{}", execution.execution_id);
        let notifications: Vec<_> = self
            .evidence
            .stream_events(&stream)
            .into_iter()
            .filter(|e| e.event_type == "rollback_notification_emitted")
            .collect();

        let emitted = notifications.len();
        let failed_channels: usize = notifications
            .iter()
            .filter_map(|e| e.data.get("channels_failed").and_then(EvidenceValue::as_number))
            .sum::<f64>() as usize;

        // Start plus terminal transition are the minimum expected.
        let (severity, description) = if emitted < 2 {
            (
                FindingSeverity::High,
                format!("Only {emitted} notification(s) were emitted; stakeholders may not have been informed."),
            )
        } else if failed_channels > 0 {
            (
                FindingSeverity::Medium,
                format!("{emitted} notifications emitted, but {failed_channels} channel delivery(ies) failed."),
            )
        } else {
            (
                FindingSeverity::Info,
                format!("{emitted} notifications emitted and delivered across all channels."),
            )
        };

        let mut finding = AnalysisFinding::new(
            AnalysisType::Communication,
            severity,
            "Communication Effectiveness",
            description,
            EvidenceValue::map()
                .with("notifications_emitted", emitted)
                .with("channel_failures", failed_channels),
        );
        if severity > FindingSeverity::Info {
            finding = finding
                .with_recommendation("Verify notification channel health and audience routing");
        }
        finding
    }

    /// Compliance: the five required checks.
    fn analyze_compliance(
        &self,
        execution: &RollbackExecution,
        metrics: &mut BTreeMap<String, f64>,
    ) -> AnalysisFinding {
        let decision = &execution.decision;
        let impact = &decision.business_impact;

        let decision_documented =
            !decision.justification.is_empty() && !decision.forensic_hash.is_empty();
        let evidence_preserved =
            !decision.evidence.is_empty() && execution.forensic_timeline.len() >= 4;

        let chronology_valid = match (execution.start_time, execution.end_time) {
            (Some(start), Some(end)) => {
                decision.timestamp <= start
                    && start <= end
                    && execution
                        .execution_steps
                        .iter()
                        .all(|s| s.timestamp >= start && s.timestamp <= end)
            }
            _ => false,
        };

        let decision_maker_recorded = !decision.decision_maker.is_empty();
        let impact_quantified = impact.estimated_loss > Decimal::ZERO
            && impact.confidence > 0.0
            && !impact.evidence.is_empty();

        let checks = [
            ("decision_documented", decision_documented),
            ("evidence_preserved", evidence_preserved),
            ("timeline_chronology_valid", chronology_valid),
            ("decision_maker_recorded", decision_maker_recorded),
            ("impact_quantified", impact_quantified),
        ];
        let passed = checks.iter().filter(|(_, ok)| *ok).count();
        let score = passed as f64 / checks.len() as f64 * 100.0;
        metrics.insert("compliance_score".to_string(), score);

        let severity = if score < 70.0 {
            FindingSeverity::Critical
        } else if score < 85.0 {
            FindingSeverity::High
        } else if score < 95.0 {
            FindingSeverity::Medium
        } else {
            FindingSeverity::Low
        };

        let mut check_evidence = EvidenceValue::map();
        for (name, ok) in checks {
            check_evidence = check_evidence.with(name, ok);
        }

        let mut finding = AnalysisFinding::new(
            AnalysisType::Compliance,
            severity,
            "Compliance Validation",
            format!(
                "{passed}/{} required compliance checks passed ({score:.0}%).",
                checks.len()
            ),
            check_evidence.with("compliance_score", score),
        );

        if !decision_documented {
            finding = finding.with_recommendation("Complete decision documentation");
        }
        if !evidence_preserved {
            finding = finding.with_recommendation("Enhance evidence collection procedures");
        }
        if !chronology_valid {
            finding = finding.with_recommendation("Validate timeline chronology recording");
        }
        if !impact_quantified {
            finding =
                finding.with_recommendation("Quantify financial impact of rollback decisions");
        }
        finding
    }

    /// Lessons learned: synthesized from the other findings.
    fn extract_lessons(
        execution: &RollbackExecution,
        findings: &[AnalysisFinding],
    ) -> AnalysisFinding {
        let severe = findings
            .iter()
            .filter(|f| f.severity >= FindingSeverity::High)
            .count();

        let lessons: Vec<EvidenceValue> = findings
            .iter()
            .map(|f| {
                EvidenceValue::map()
                    .with("axis", f.analysis_type.as_str())
                    .with("severity", f.severity.as_str())
                    .with("lesson", f.description.clone())
            })
            .collect();

        AnalysisFinding::new(
            AnalysisType::LessonsLearned,
            FindingSeverity::Info,
            "Lessons Learned",
            format!(
                "Rollback of {} via {} ended {} with {severe} high-severity finding(s).",
                execution.deployment_id,
                execution.strategy,
                execution.status
            ),
            EvidenceValue::map().with("lessons", EvidenceValue::Seq(lessons)),
        )
        .with_recommendation("Fold this incident's findings into the runbook review")
    }
}
