//! Forensic health validation for the Vigil platform.
//!
//! This crate provides the typed health probe layer of the platform:
//!
//! - **Tamper-Evident Results**: every [`HealthCheckResult`] carries a
//!   SHA-256 hash over its fields and can be re-verified at any time
//! - **Probe Contract**: the [`HealthProbe`] trait for pluggable checks,
//!   with built-in system-resource, network, and cluster-quorum probes
//! - **Phased Execution**: the [`ProbeRegistry`] runs probes concurrently
//!   with per-probe timeouts and cooperative cancellation; phases let
//!   infrastructure checks gate industry checks
//! - **Performance Tracking**: probe duration and score feed the baseline
//!   store and raise regression evidence when a probe drifts
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_baseline::BaselineStore;
//! use vigil_evidence::EvidenceLog;
//! use vigil_health::{ProbeRegistry, RegistryConfig, SystemResourcesProbe};
//! use vigil_regression::RegressionDetector;
//!
//! # async fn run() -> Result<(), vigil_health::HealthError> {
//! let mut registry = ProbeRegistry::new(
//!     RegistryConfig::default(),
//!     BaselineStore::default(),
//!     RegressionDetector::default(),
//!     EvidenceLog::in_memory(),
//! );
//! registry.register("infrastructure_system", Arc::new(SystemResourcesProbe::new()))?;
//!
//! let results = registry.execute_all().await;
//! assert!(results.contains_key("infrastructure_system"));
//! # Ok(())
//! # }
//! ```

pub mod probe;
pub mod registry;
pub mod report;
pub mod types;

pub use probe::{ClusterQuorumProbe, HealthProbe, NetworkReachabilityProbe, SystemResourcesProbe};
pub use registry::{HealthError, ProbeRegistry, RegistryConfig, Result};
pub use report::{HealthReport, StatusCounts};
pub use types::{HealthCheckResult, HealthCheckResultBuilder, HealthStatus, Severity};
