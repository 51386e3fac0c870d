//! Per-metric performance baselines for the Vigil platform.
//!
//! This crate maintains bounded sliding windows of metric observations and
//! derives the statistics that regression detection and impact assessment
//! compare against:
//!
//! - **Window statistics**: mean, sample standard deviation, p95/p99,
//!   min/max over the most recent window
//! - **Confidence intervals**: 95% interval for the mean using Student's t
//! - **EWMA tracking**: exponentially weighted mean and standard deviation
//!   (α = 0.1) for drift-sensitive comparisons
//! - **Readiness gating**: a baseline is only exposed once a metric has
//!   accumulated the configured minimum number of samples
//!
//! # Quick Start
//!
//! ```rust
//! use vigil_baseline::{BaselineConfig, BaselineStore};
//!
//! let store = BaselineStore::new(BaselineConfig::new().with_minimum_samples(3));
//!
//! store.record_now("api_response_time_ms", 42.0);
//! store.record_now("api_response_time_ms", 45.0);
//! assert!(store.baseline("api_response_time_ms").is_none());
//!
//! store.record_now("api_response_time_ms", 44.0);
//! let baseline = store.baseline("api_response_time_ms").unwrap();
//! assert_eq!(baseline.sample_count, 3);
//! ```

pub mod store;
pub mod types;

pub use store::BaselineStore;
pub use types::{BaselineConfig, PerformanceBaseline};
