//! The strategy driver contract and reference drivers.
//!
//! Drivers carry out individual rollback steps against real
//! infrastructure. The core never talks to infrastructure directly; it
//! hands each step to the strategy's driver and records the outcome.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use vigil_evidence::EvidenceValue;

use crate::strategy::{StepSpec, StrategyKind};

/// Context handed to a driver for each step.
#[derive(Debug, Clone)]
pub struct StepInput {
    /// The execution this step belongs to.
    pub execution_id: String,
    /// The deployment being rolled back.
    pub deployment_id: String,
    /// The strategy being executed.
    pub strategy: StrategyKind,
}

/// Outcome of one driver step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Whether the step succeeded.
    pub success: bool,
    /// Driver-measured duration in milliseconds, if it reports one.
    pub duration_ms: f64,
    /// Step-specific result data.
    pub data: EvidenceValue,
    /// Error description on failure.
    pub error: Option<String>,
}

impl StepOutcome {
    /// A successful outcome with data.
    #[must_use]
    pub fn success(data: EvidenceValue) -> Self {
        Self {
            success: true,
            duration_ms: 0.0,
            data,
            error: None,
        }
    }

    /// A failed outcome with an error description.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            duration_ms: 0.0,
            data: EvidenceValue::map(),
            error: Some(error.into()),
        }
    }
}

/// Executes individual steps of one rollback strategy.
#[async_trait]
pub trait StrategyDriver: Send + Sync {
    /// Executes one step.
    ///
    /// Returning `Err` is equivalent to a failed outcome; the executor
    /// converts it and never propagates.
    async fn execute_step(&self, step: &StepSpec, input: &StepInput)
    -> anyhow::Result<StepOutcome>;
}

/// Simulated driver that succeeds every step after a short pause.
///
/// Stands in for real infrastructure drivers in demos and tests; the step
/// delay is configurable so tests can run fast.
#[derive(Debug, Clone)]
pub struct SimulatedDriver {
    step_delay: Duration,
}

impl SimulatedDriver {
    /// Creates a driver with the given per-step delay.
    #[must_use]
    pub const fn new(step_delay: Duration) -> Self {
        Self { step_delay }
    }
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new(Duration::from_millis(25))
    }
}

#[async_trait]
impl StrategyDriver for SimulatedDriver {
    async fn execute_step(
        &self,
        step: &StepSpec,
        input: &StepInput,
    ) -> anyhow::Result<StepOutcome> {
        sleep(self.step_delay).await;

        let data = match step.name.as_str() {
            "identify_previous_version" => EvidenceValue::map()
                .with("previous_version", format!("{}_previous", input.deployment_id)),
            "identify_environments" => EvidenceValue::map()
                .with("current_environment", "green")
                .with("previous_environment", "blue"),
            "switch_traffic" | "verify_traffic_switch" | "restore_stable_traffic" => {
                EvidenceValue::map().with("traffic_percentage_switched", 100.0)
            }
            "create_backup" => EvidenceValue::map()
                .with("backup_created", true)
                .with("backup_size_mb", 1024.0),
            "apply_rollback_script" => EvidenceValue::map()
                .with("script_executed", true)
                .with("records_affected", 10_000.0),
            "verify_integrity" => EvidenceValue::map().with("integrity_check_passed", true),
            "notify_external_services" => EvidenceValue::map().with(
                "services_notified",
                vec!["payment_gateway", "auth_service", "analytics"],
            ),
            _ => EvidenceValue::map().with("status", "completed"),
        };

        Ok(StepOutcome::success(data))
    }
}

/// Per-step behavior for the scripted driver.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    /// Whether the step reports success.
    pub success: bool,
    /// How long the step takes.
    pub delay: Duration,
    /// Error message for failing steps.
    pub error: Option<String>,
}

impl ScriptedStep {
    /// A step that succeeds immediately.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            delay: Duration::ZERO,
            error: None,
        }
    }

    /// A step that succeeds after a delay.
    #[must_use]
    pub const fn slow(delay: Duration) -> Self {
        Self {
            success: true,
            delay,
            error: None,
        }
    }

    /// A step that fails.
    #[must_use]
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            success: false,
            delay: Duration::ZERO,
            error: Some(error.into()),
        }
    }
}

/// Driver whose step outcomes are scripted by name. Intended for tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    steps: HashMap<String, ScriptedStep>,
}

impl ScriptedDriver {
    /// Creates a driver where every unscripted step succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts one step's behavior.
    #[must_use]
    pub fn with_step(mut self, name: impl Into<String>, step: ScriptedStep) -> Self {
        self.steps.insert(name.into(), step);
        self
    }
}

#[async_trait]
impl StrategyDriver for ScriptedDriver {
    async fn execute_step(
        &self,
        step: &StepSpec,
        _input: &StepInput,
    ) -> anyhow::Result<StepOutcome> {
        let script = self.steps.get(&step.name).cloned().unwrap_or(ScriptedStep::ok());

        if !script.delay.is_zero() {
            sleep(script.delay).await;
        }

        if script.success {
            Ok(StepOutcome::success(
                EvidenceValue::map().with("scripted", true),
            ))
        } else {
            Ok(StepOutcome::failure(
                script.error.unwrap_or_else(|| "scripted failure".to_string()),
            ))
        }
    }
}
