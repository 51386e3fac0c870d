//! The rollback executor.
//!
//! Runs a selected strategy as an ordered step sequence with per-step and
//! global timeouts, records every outcome on the execution's forensic
//! timeline, mirrors events into the shared evidence log, and emits
//! notifications on start and terminal transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vigil_decision::{RollbackDecision, RollbackUrgency};
use vigil_evidence::{EvidenceLog, EvidenceValue};
use vigil_notify::{NotificationDispatcher, NotificationLevel, NotificationRequest};

use crate::driver::{StepInput, StepOutcome, StrategyDriver};
use crate::execution::{RollbackExecution, RollbackStatus};
use crate::strategy::{StepSpec, StrategyKind};

/// Errors raised at executor configuration time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RollbackError {
    /// A strategy has no registered driver. Fatal configuration error.
    #[error("No driver registered for strategy: {strategy}")]
    MissingDriver {
        /// The strategy without a driver.
        strategy: StrategyKind,
    },
}

/// Result type for executor configuration.
pub type Result<T> = std::result::Result<T, RollbackError>;

/// Maps each strategy to its driver.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<StrategyKind, Arc<dyn StrategyDriver>>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("strategies", &self.drivers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver for one strategy.
    #[must_use]
    pub fn with_driver(mut self, strategy: StrategyKind, driver: Arc<dyn StrategyDriver>) -> Self {
        self.drivers.insert(strategy, driver);
        self
    }

    /// Registers one driver for every strategy.
    #[must_use]
    pub fn with_driver_for_all(driver: Arc<dyn StrategyDriver>) -> Self {
        let mut registry = Self::new();
        for strategy in StrategyKind::all() {
            registry.drivers.insert(strategy, Arc::clone(&driver));
        }
        registry
    }

    fn get(&self, strategy: StrategyKind) -> Option<&Arc<dyn StrategyDriver>> {
        self.drivers.get(&strategy)
    }
}

/// Timeouts governing rollback execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Default per-step timeout.
    pub step_timeout: Duration,
    /// Global execution timeout.
    pub execution_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(60),
            execution_timeout: Duration::from_secs(600),
        }
    }
}

/// Executes rollback strategies against their drivers.
pub struct RollbackExecutor {
    drivers: DriverRegistry,
    config: ExecutorConfig,
    notifications: Arc<NotificationDispatcher>,
    evidence: EvidenceLog,
}

impl std::fmt::Debug for RollbackExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackExecutor")
            .field("drivers", &self.drivers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RollbackExecutor {
    /// Creates an executor, validating that every strategy has a driver.
    ///
    /// # Errors
    ///
    /// Returns [`RollbackError::MissingDriver`] when any strategy lacks a
    /// driver; an unknown strategy at runtime is not tolerated.
    pub fn new(
        drivers: DriverRegistry,
        config: ExecutorConfig,
        notifications: Arc<NotificationDispatcher>,
        evidence: EvidenceLog,
    ) -> Result<Self> {
        for strategy in StrategyKind::all() {
            if drivers.get(strategy).is_none() {
                return Err(RollbackError::MissingDriver { strategy });
            }
        }

        Ok(Self {
            drivers,
            config,
            notifications,
            evidence,
        })
    }

    /// Returns the executor configuration.
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes the strategy selected by the decision.
    ///
    /// Always returns the execution record; runtime failures end the
    /// record in Failed, never in an error.
    pub async fn execute(
        &self,
        decision: RollbackDecision,
        deployment_id: &str,
    ) -> RollbackExecution {
        let strategy = StrategyKind::select(
            decision.urgency,
            decision.business_impact.impact_level,
        );
        self.execute_strategy(decision, deployment_id, strategy, &CancellationToken::new())
            .await
    }

    /// Executes a specific strategy under a cancellation token.
    ///
    /// Cancellation between steps ends the execution in Cancelled with a
    /// forensic event; a cancelled in-flight step is discarded.
    pub async fn execute_strategy(
        &self,
        decision: RollbackDecision,
        deployment_id: &str,
        strategy: StrategyKind,
        cancel: &CancellationToken,
    ) -> RollbackExecution {
        let mut execution = RollbackExecution::new(decision, deployment_id, strategy);
        let stream = format!("rollback/{}", execution.execution_id);

        if execution.start().is_err() {
            // Unreachable for a fresh record; the tainted record is
            // returned as-is for forensic review.
            return execution;
        }

        self.evidence.append(
            &stream,
            "rollback_execution_started",
            EvidenceValue::map()
                .with("execution_id", execution.execution_id.to_string())
                .with("deployment_id", deployment_id)
                .with("strategy", strategy.as_str())
                .with("urgency", execution.decision.urgency.as_str()),
        );
        self.notify_phase(&execution, "started").await;

        let deadline = Instant::now() + self.config.execution_timeout;
        let input = StepInput {
            execution_id: execution.execution_id.to_string(),
            deployment_id: deployment_id.to_string(),
            strategy,
        };

        let outcome = self
            .run_steps(&mut execution, strategy, &input, deadline, cancel)
            .await;

        let final_status = match outcome {
            StepLoopOutcome::Completed => RollbackStatus::Completed,
            StepLoopOutcome::CriticalFailure => RollbackStatus::Failed,
            StepLoopOutcome::TimedOut => {
                execution.add_error(
                    "execution_timeout",
                    format!(
                        "rollback exceeded the {}s execution timeout",
                        self.config.execution_timeout.as_secs()
                    ),
                    EvidenceValue::map()
                        .with("timeout_seconds", self.config.execution_timeout.as_secs_f64()),
                );
                RollbackStatus::Failed
            }
            StepLoopOutcome::Cancelled => {
                execution.add_error(
                    "execution_cancelled",
                    "rollback cancelled by shutdown",
                    EvidenceValue::map(),
                );
                RollbackStatus::Cancelled
            }
        };

        if execution.complete(final_status).is_err() {
            warn!(
                execution_id = %execution.execution_id,
                "execution record rejected terminal transition"
            );
        }

        self.evidence.append(
            &stream,
            "rollback_execution_completed",
            EvidenceValue::map()
                .with("execution_id", execution.execution_id.to_string())
                .with("final_status", final_status.as_str())
                .with("steps_executed", execution.execution_steps.len())
                .with("errors_encountered", execution.error_log.len()),
        );
        let phase = match final_status {
            RollbackStatus::Completed => "completed",
            RollbackStatus::Cancelled => "cancelled",
            _ => "failed",
        };
        self.notify_phase(&execution, phase).await;

        execution
    }

    async fn run_steps(
        &self,
        execution: &mut RollbackExecution,
        strategy: StrategyKind,
        input: &StepInput,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> StepLoopOutcome {
        let Some(driver) = self.drivers.get(strategy) else {
            // Guarded at construction; kept for defense in depth of the
            // forensic record.
            execution.add_error(
                "unknown_strategy",
                format!("no driver for strategy {strategy}"),
                EvidenceValue::map(),
            );
            return StepLoopOutcome::CriticalFailure;
        };

        for step in strategy.steps() {
            if cancel.is_cancelled() {
                return StepLoopOutcome::Cancelled;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return StepLoopOutcome::TimedOut;
            }

            let step_timeout = step
                .timeout_secs
                .map_or(self.config.step_timeout, Duration::from_secs)
                .min(remaining);

            let started = Instant::now();
            let outcome = tokio::select! {
                () = cancel.cancelled() => return StepLoopOutcome::Cancelled,
                result = tokio::time::timeout(step_timeout, driver.execute_step(&step, input)) => {
                    match result {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(error)) => StepOutcome::failure(format!("driver error: {error}")),
                        Err(_) => StepOutcome::failure(format!(
                            "step timed out after {}s",
                            step_timeout.as_secs_f64()
                        )),
                    }
                }
            };
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            execution.add_step(&step.name, outcome.success, duration_ms, outcome.data.clone());

            if !outcome.success {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "step reported failure".to_string());
                warn!(
                    execution_id = %execution.execution_id,
                    step = %step.name,
                    critical = step.critical,
                    %message,
                    "rollback step failed"
                );
                execution.add_error(
                    "step_failed",
                    message,
                    EvidenceValue::map()
                        .with("step_name", step.name.clone())
                        .with("critical", step.critical),
                );

                if step.critical {
                    return StepLoopOutcome::CriticalFailure;
                }
            }

            if Instant::now() >= deadline {
                return StepLoopOutcome::TimedOut;
            }
        }

        StepLoopOutcome::Completed
    }

    async fn notify_phase(&self, execution: &RollbackExecution, phase: &str) {
        let level = match execution.decision.urgency {
            RollbackUrgency::Emergency | RollbackUrgency::Immediate => NotificationLevel::Critical,
            RollbackUrgency::Urgent | RollbackUrgency::High => NotificationLevel::Warning,
            _ => NotificationLevel::Info,
        };

        let request = NotificationRequest::new(
            level,
            format!("Rollback {phase}: {}", execution.deployment_id),
            format!(
                "Execution {} ({}) {} with urgency {} and estimated loss ${}",
                execution.execution_id,
                execution.strategy,
                phase,
                execution.decision.urgency,
                execution.decision.business_impact.estimated_loss
            ),
        )
        .with_correlation_id(execution.execution_id.to_string())
        .with_audience("oncall");

        let results = self.notifications.dispatch(&request).await;
        let failures = results.iter().filter(|r| !r.success).count();
        if failures > 0 {
            info!(
                execution_id = %execution.execution_id,
                failures,
                "some notification channels failed; continuing"
            );
        }

        self.evidence.append(
            &format!("rollback/{}", execution.execution_id),
            "rollback_notification_emitted",
            EvidenceValue::map()
                .with("phase", phase)
                .with("level", level.as_str())
                .with("channels_attempted", results.len())
                .with("channels_failed", failures),
        );
    }
}

enum StepLoopOutcome {
    Completed,
    CriticalFailure,
    TimedOut,
    Cancelled,
}
