//! Top-level orchestration for the Vigil platform.
//!
//! The orchestrator owns every component instance and ties them into the
//! monitoring loop: tick → collect → assess → decide → execute → analyze.
//!
//! - Collectors run concurrently each cycle; their metrics feed the
//!   shared baseline store before impact assessment
//! - Assessments aggregate into one [`vigil_metrics::OverallImpact`] for
//!   the decision engine
//! - Positive decisions spawn rollback executions without blocking the
//!   loop; terminal executions are swept and analyzed
//! - Health probes run phased on a slower cadence and feed the decision
//!   engine as ancillary evidence
//! - A failing cycle is recorded as evidence and the loop continues; a
//!   shutdown signal stops scheduling and gives active rollbacks a grace
//!   window before cancelling them
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use vigil_orchestrator::{OrchestratorBuilder, OrchestratorConfig};
//!
//! # async fn run() -> Result<(), vigil_orchestrator::BuildError> {
//! let orchestrator =
//!     OrchestratorBuilder::new(OrchestratorConfig::default(), "deploy-2024-06-01").build()?;
//!
//! orchestrator.initialize().await;
//! orchestrator.run().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod orchestrator;

pub use config::{Industry, OrchestratorConfig};
pub use orchestrator::{BuildError, CycleReport, Orchestrator, OrchestratorBuilder};
