//! Strategy-based rollback execution for the Vigil platform.
//!
//! This crate turns a positive [`vigil_decision::RollbackDecision`] into a
//! concrete, fully documented rollback run:
//!
//! - **Strategies**: named ordered step sequences (`rolling`,
//!   `blue_green`, `canary`, `database`, `full_stack`), selected from the
//!   decision's urgency and impact level
//! - **Drivers**: the [`StrategyDriver`] contract delegates each step to
//!   infrastructure-specific collaborators with per-step timeouts
//! - **State machine**: a [`RollbackExecution`] only moves
//!   Pending → InProgress → {Completed, Failed, Cancelled}; every
//!   transition is mirrored into a hash-linked forensic timeline
//! - **Execution loop**: non-critical step failures continue, critical
//!   failures abort, the global timeout forces Failed, and notifications
//!   fire on start and terminal transition
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_evidence::EvidenceLog;
//! use vigil_notify::{NotificationDispatcher, TracingNotificationChannel};
//! use vigil_rollback::{
//!     DriverRegistry, ExecutorConfig, RollbackExecutor, SimulatedDriver,
//! };
//!
//! # fn build() -> vigil_rollback::Result<RollbackExecutor> {
//! let executor = RollbackExecutor::new(
//!     DriverRegistry::with_driver_for_all(Arc::new(SimulatedDriver::default())),
//!     ExecutorConfig::default(),
//!     Arc::new(NotificationDispatcher::new(vec![
//!         Arc::new(TracingNotificationChannel::new()),
//!     ])),
//!     EvidenceLog::in_memory(),
//! )?;
//! # Ok(executor)
//! # }
//! ```

pub mod driver;
pub mod execution;
pub mod executor;
pub mod strategy;

pub use driver::{
    ScriptedDriver, ScriptedStep, SimulatedDriver, StepInput, StepOutcome, StrategyDriver,
};
pub use execution::{
    ExecutionErrorEntry, ExecutionStateError, ExecutionStep, RollbackExecution, RollbackStatus,
};
pub use executor::{DriverRegistry, ExecutorConfig, Result, RollbackError, RollbackExecutor};
pub use strategy::{StepSpec, StrategyKind};
