//! The rollback execution record and its state machine.
//!
//! An execution may only move Pending → InProgress → {Completed, Failed,
//! Cancelled}. Every transition, step, and error is mirrored into an
//! append-only, hash-linked forensic timeline. An illegal transition
//! marks the record tampered; tampered records accept no further
//! transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;
use vigil_decision::RollbackDecision;
use vigil_evidence::{EvidenceEvent, EvidenceValue};

use crate::strategy::StrategyKind;

/// Lifecycle states of a rollback execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RollbackStatus {
    /// Created but not yet started.
    Pending,
    /// Steps are being executed.
    InProgress,
    /// All steps finished and the execution succeeded.
    Completed,
    /// The execution failed.
    Failed,
    /// The execution was cancelled before reaching a verdict.
    Cancelled,
}

impl RollbackStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns true for Completed, Failed, and Cancelled.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RollbackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by the execution state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionStateError {
    /// A transition outside the legal state machine was attempted.
    #[error("Illegal execution transition: {from} -> {to}")]
    IllegalTransition {
        /// The current status.
        from: RollbackStatus,
        /// The attempted status.
        to: RollbackStatus,
    },

    /// The record was marked tampered; no transitions are accepted.
    #[error("Execution record is tampered; transitions rejected")]
    Tampered,
}

/// One recorded step outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Step name.
    pub step_name: String,
    /// When the step finished.
    pub timestamp: DateTime<Utc>,
    /// Whether the step succeeded.
    pub success: bool,
    /// Step wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Driver-reported step data.
    pub data: EvidenceValue,
}

/// One recorded error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionErrorEntry {
    /// Error classification tag (e.g. `execution_timeout`).
    pub error_type: String,
    /// Human-readable message.
    pub message: String,
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
    /// Structured error context.
    pub data: EvidenceValue,
}

/// Mutable record of a running or completed rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackExecution {
    /// Unique execution id.
    pub execution_id: Uuid,
    /// The decision that authorized this execution.
    pub decision: RollbackDecision,
    /// The deployment being rolled back.
    pub deployment_id: String,
    /// The strategy being executed.
    pub strategy: StrategyKind,
    /// Current lifecycle status.
    pub status: RollbackStatus,
    /// When execution entered InProgress.
    pub start_time: Option<DateTime<Utc>>,
    /// When execution reached a terminal status.
    pub end_time: Option<DateTime<Utc>>,
    /// Ordered step outcomes.
    pub execution_steps: Vec<ExecutionStep>,
    /// Recorded errors.
    pub error_log: Vec<ExecutionErrorEntry>,
    /// Hash-linked timeline mirroring every state transition.
    pub forensic_timeline: Vec<EvidenceEvent>,
    /// Set when an invariant violation was detected on this record.
    pub tampered: bool,
}

impl RollbackExecution {
    /// Creates a pending execution for a decision.
    #[must_use]
    pub fn new(
        decision: RollbackDecision,
        deployment_id: impl Into<String>,
        strategy: StrategyKind,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            decision,
            deployment_id: deployment_id.into(),
            strategy,
            status: RollbackStatus::Pending,
            start_time: None,
            end_time: None,
            execution_steps: Vec::new(),
            error_log: Vec::new(),
            forensic_timeline: Vec::new(),
            tampered: false,
        }
    }

    /// Transitions Pending → InProgress.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionStateError::IllegalTransition`] from any other
    /// state, marking the record tampered.
    pub fn start(&mut self) -> Result<(), ExecutionStateError> {
        self.guard_transition(RollbackStatus::InProgress)?;

        self.start_time = Some(Utc::now());
        self.status = RollbackStatus::InProgress;

        self.log_timeline_event(
            "rollback_execution_started",
            EvidenceValue::map()
                .with("execution_id", self.execution_id.to_string())
                .with("decision_id", self.decision.decision_id.to_string())
                .with("urgency", self.decision.urgency.as_str())
                .with("strategy", self.strategy.as_str())
                .with(
                    "estimated_loss",
                    self.decision.business_impact.estimated_loss.to_string(),
                ),
        );

        info!(
            execution_id = %self.execution_id,
            strategy = %self.strategy,
            "rollback execution started"
        );
        Ok(())
    }

    /// Transitions InProgress → a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionStateError::IllegalTransition`] for non-terminal
    /// targets or when not InProgress, marking the record tampered.
    pub fn complete(&mut self, status: RollbackStatus) -> Result<(), ExecutionStateError> {
        if !status.is_terminal() {
            return self.reject_transition(status);
        }
        self.guard_transition(status)?;

        self.end_time = Some(Utc::now());
        self.status = status;

        let duration_seconds = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        };
        let successful_steps = self.execution_steps.iter().filter(|s| s.success).count();
        let success_rate = if self.execution_steps.is_empty() {
            0.0
        } else {
            successful_steps as f64 / self.execution_steps.len() as f64 * 100.0
        };

        self.log_timeline_event(
            "rollback_execution_completed",
            EvidenceValue::map()
                .with("execution_id", self.execution_id.to_string())
                .with("final_status", status.as_str())
                .with("duration_seconds", duration_seconds)
                .with("steps_executed", self.execution_steps.len())
                .with("errors_encountered", self.error_log.len())
                .with("step_success_rate", success_rate),
        );

        info!(
            execution_id = %self.execution_id,
            status = %status,
            duration_seconds,
            "rollback execution completed"
        );
        Ok(())
    }

    /// Records one step outcome and mirrors it to the timeline.
    pub fn add_step(
        &mut self,
        step_name: impl Into<String>,
        success: bool,
        duration_ms: f64,
        data: EvidenceValue,
    ) {
        let step_name = step_name.into();
        self.execution_steps.push(ExecutionStep {
            step_name: step_name.clone(),
            timestamp: Utc::now(),
            success,
            duration_ms,
            data: data.clone(),
        });

        self.log_timeline_event(
            "rollback_step_executed",
            EvidenceValue::map()
                .with("step_name", step_name)
                .with("success", success)
                .with("step_number", self.execution_steps.len())
                .with("duration_ms", duration_ms)
                .with("data", data),
        );
    }

    /// Records an error and mirrors it to the timeline.
    pub fn add_error(
        &mut self,
        error_type: impl Into<String>,
        message: impl Into<String>,
        data: EvidenceValue,
    ) {
        let error_type = error_type.into();
        let message = message.into();

        self.error_log.push(ExecutionErrorEntry {
            error_type: error_type.clone(),
            message: message.clone(),
            timestamp: Utc::now(),
            data: data.clone(),
        });

        self.log_timeline_event(
            "rollback_error_occurred",
            EvidenceValue::map()
                .with("error_type", error_type)
                .with("error_message", message)
                .with("error_count", self.error_log.len())
                .with("data", data),
        );
    }

    /// Verifies the forensic timeline's hashes and linkage.
    #[must_use]
    pub fn verify_timeline(&self) -> bool {
        let mut previous: Option<&str> = None;
        for event in &self.forensic_timeline {
            if !event.verify_hash() || event.previous_hash.as_deref() != previous {
                return false;
            }
            previous = Some(event.event_hash.as_str());
        }
        true
    }

    /// Wall-clock duration of the execution, when both ends are known.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    fn guard_transition(&mut self, to: RollbackStatus) -> Result<(), ExecutionStateError> {
        if self.tampered {
            return Err(ExecutionStateError::Tampered);
        }

        let legal = matches!(
            (self.status, to),
            (RollbackStatus::Pending, RollbackStatus::InProgress)
                | (
                    RollbackStatus::InProgress,
                    RollbackStatus::Completed
                        | RollbackStatus::Failed
                        | RollbackStatus::Cancelled,
                )
        );

        if legal {
            Ok(())
        } else {
            self.reject_transition(to)
        }
    }

    fn reject_transition(&mut self, to: RollbackStatus) -> Result<(), ExecutionStateError> {
        if self.tampered {
            return Err(ExecutionStateError::Tampered);
        }

        let from = self.status;
        self.tampered = true;
        error!(
            execution_id = %self.execution_id,
            %from,
            %to,
            "illegal execution transition; record marked tampered"
        );
        self.log_timeline_event(
            "invariant_violation_detected",
            EvidenceValue::map()
                .with("from_status", from.as_str())
                .with("to_status", to.as_str()),
        );
        Err(ExecutionStateError::IllegalTransition { from, to })
    }

    fn log_timeline_event(&mut self, event_type: &str, data: EvidenceValue) {
        let mut event = EvidenceEvent::new(event_type, data);
        if let Some(last) = self.forensic_timeline.last() {
            event = event.with_previous_hash(last.event_hash.clone());
        }
        self.forensic_timeline.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use vigil_decision::RollbackUrgency;
    use vigil_metrics::{BusinessImpactAssessment, ImpactLevel, TriggerType};

    fn decision() -> RollbackDecision {
        RollbackDecision::new(
            true,
            RollbackUrgency::Urgent,
            BusinessImpactAssessment::new(
                "deploy-1",
                ImpactLevel::High,
                Decimal::from(12_000),
                0.9,
                TriggerType::RevenueLoss,
                EvidenceValue::map(),
                Vec::new(),
                "test",
            ),
            "losses exceed thresholds",
            EvidenceValue::map(),
        )
    }

    fn execution() -> RollbackExecution {
        RollbackExecution::new(decision(), "deploy-1", StrategyKind::BlueGreen)
    }

    mod state_machine_tests {
        use super::*;

        #[test]
        fn legal_lifecycle_completed() {
            let mut exec = execution();
            assert_eq!(exec.status, RollbackStatus::Pending);

            exec.start().unwrap_or_else(|_| panic!("start should succeed"));
            assert_eq!(exec.status, RollbackStatus::InProgress);
            assert!(exec.start_time.is_some());

            exec.complete(RollbackStatus::Completed)
                .unwrap_or_else(|_| panic!("complete should succeed"));
            assert_eq!(exec.status, RollbackStatus::Completed);
            assert!(exec.end_time.is_some());
        }

        #[test]
        fn completing_from_pending_is_illegal() {
            let mut exec = execution();
            let result = exec.complete(RollbackStatus::Completed);
            assert!(matches!(
                result,
                Err(ExecutionStateError::IllegalTransition { .. })
            ));
            assert!(exec.tampered);
        }

        #[test]
        fn double_start_is_illegal() {
            let mut exec = execution();
            exec.start().unwrap_or_else(|_| panic!("start should succeed"));
            assert!(exec.start().is_err());
            assert!(exec.tampered);
        }

        #[test]
        fn completing_to_pending_is_illegal() {
            let mut exec = execution();
            exec.start().unwrap_or_else(|_| panic!("start should succeed"));
            assert!(exec.complete(RollbackStatus::Pending).is_err());
        }

        #[test]
        fn terminal_states_accept_no_further_transitions() {
            let mut exec = execution();
            exec.start().unwrap_or_else(|_| panic!("start should succeed"));
            exec.complete(RollbackStatus::Failed)
                .unwrap_or_else(|_| panic!("complete should succeed"));

            assert!(exec.complete(RollbackStatus::Completed).is_err());
        }

        #[test]
        fn tampered_record_rejects_everything() {
            let mut exec = execution();
            let _ = exec.complete(RollbackStatus::Completed); // illegal, taints
            assert!(exec.tampered);

            let result = exec.start();
            assert!(matches!(result, Err(ExecutionStateError::Tampered)));
        }

        #[test]
        fn illegal_transition_is_recorded_in_timeline() {
            let mut exec = execution();
            let _ = exec.complete(RollbackStatus::Completed);

            assert!(
                exec.forensic_timeline
                    .iter()
                    .any(|e| e.event_type == "invariant_violation_detected")
            );
        }

        #[test]
        fn cancelled_is_a_legal_terminal_state() {
            let mut exec = execution();
            exec.start().unwrap_or_else(|_| panic!("start should succeed"));
            exec.complete(RollbackStatus::Cancelled)
                .unwrap_or_else(|_| panic!("cancel should succeed"));
            assert_eq!(exec.status, RollbackStatus::Cancelled);
        }
    }

    mod timeline_tests {
        use super::*;

        #[test]
        fn every_action_appends_a_linked_event() {
            let mut exec = execution();
            exec.start().unwrap_or_else(|_| panic!("start should succeed"));
            exec.add_step("switch_traffic", true, 420.0, EvidenceValue::map());
            exec.add_error("driver_error", "connection reset", EvidenceValue::map());
            exec.complete(RollbackStatus::Failed)
                .unwrap_or_else(|_| panic!("complete should succeed"));

            assert_eq!(exec.forensic_timeline.len(), 4);
            assert!(exec.verify_timeline());
        }

        #[test]
        fn tampered_timeline_fails_verification() {
            let mut exec = execution();
            exec.start().unwrap_or_else(|_| panic!("start should succeed"));
            exec.add_step("switch_traffic", true, 420.0, EvidenceValue::map());

            exec.forensic_timeline[0].data = EvidenceValue::map().with("forged", true);
            assert!(!exec.verify_timeline());
        }

        #[test]
        fn step_timestamps_fall_within_execution_window() {
            let mut exec = execution();
            exec.start().unwrap_or_else(|_| panic!("start should succeed"));
            exec.add_step("identify_environments", true, 10.0, EvidenceValue::map());
            exec.add_step("switch_traffic", true, 10.0, EvidenceValue::map());
            exec.complete(RollbackStatus::Completed)
                .unwrap_or_else(|_| panic!("complete should succeed"));

            let start = exec.start_time.unwrap_or_else(|| panic!("start set"));
            let end = exec.end_time.unwrap_or_else(|| panic!("end set"));
            for step in &exec.execution_steps {
                assert!(step.timestamp >= start);
                assert!(step.timestamp <= end);
            }
        }

        #[test]
        fn completion_event_carries_summary_counts() {
            let mut exec = execution();
            exec.start().unwrap_or_else(|_| panic!("start should succeed"));
            exec.add_step("a", true, 1.0, EvidenceValue::map());
            exec.add_step("b", false, 1.0, EvidenceValue::map());
            exec.complete(RollbackStatus::Failed)
                .unwrap_or_else(|_| panic!("complete should succeed"));

            let completion = exec
                .forensic_timeline
                .iter()
                .find(|e| e.event_type == "rollback_execution_completed")
                .unwrap_or_else(|| panic!("completion event expected"));

            assert_eq!(
                completion.data.get("steps_executed").and_then(EvidenceValue::as_number),
                Some(2.0)
            );
            assert_eq!(
                completion
                    .data
                    .get("step_success_rate")
                    .and_then(EvidenceValue::as_number),
                Some(50.0)
            );
        }
    }
}
