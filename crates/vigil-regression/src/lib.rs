//! Multi-method performance regression detection for the Vigil platform.
//!
//! Given a metric name and a current observation, the detector decides
//! whether it represents a regression and with what confidence, running
//! three complementary methods:
//!
//! - **Statistical**: z-score against the baseline mean and standard
//!   deviation plus a percent-deviation threshold, with the degrading
//!   direction derived from the metric's semantic class
//! - **Distributional outlier**: a seeded isolation-style forest fit on
//!   the metric window
//! - **Change-point**: Welch's t-test between two adjacent windows
//!
//! Any positive method produces a detection event; callers may require
//! k-of-n concurrence through [`DetectorConfig::required_method_votes`].
//!
//! # Quick Start
//!
//! ```rust
//! use vigil_baseline::{BaselineConfig, BaselineStore};
//! use vigil_regression::{DetectorConfig, RegressionDetector};
//!
//! let store = BaselineStore::new(BaselineConfig::new().with_minimum_samples(20));
//! for i in 0..40 {
//!     store.record_now("api_response_time_ms", 45.0 + f64::from(i % 5));
//! }
//!
//! let detector = RegressionDetector::new(DetectorConfig::new());
//! let analysis = detector.analyze("api_response_time_ms", 250.0, &store);
//! assert!(analysis.is_regression);
//! ```

pub mod detector;
pub mod outlier;
pub mod semantics;
pub mod types;

pub use detector::RegressionDetector;
pub use outlier::OutlierModel;
pub use semantics::MetricSemantics;
pub use types::{
    DetectionMethod, DetectorConfig, RegressionAnalysis, RegressionDetectionResult,
    RegressionSeverity,
};
