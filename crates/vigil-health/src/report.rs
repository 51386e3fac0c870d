//! Aggregated health reports.
//!
//! Folds a batch of probe results into one report with an overall status,
//! score, per-status counts, and a combined hash binding the report to the
//! exact results it was derived from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_evidence::combine_hashes;

use crate::types::{HealthCheckResult, HealthStatus};

/// Per-status counts across a result batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Results with status Healthy.
    pub healthy: usize,
    /// Results with status Degraded.
    pub degraded: usize,
    /// Results with status Critical.
    pub critical: usize,
    /// Results with status Unknown.
    pub unknown: usize,
    /// Results with status Maintenance.
    pub maintenance: usize,
}

/// Aggregated view over one execution batch of health probes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Unique report identifier.
    pub report_id: Uuid,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Overall status: any Critical wins, then any Degraded, else Healthy.
    pub overall_status: HealthStatus,
    /// Mean score across all results.
    pub overall_score: f64,
    /// Per-status counts.
    pub counts: StatusCounts,
    /// The individual results keyed by probe name.
    pub results: BTreeMap<String, HealthCheckResult>,
    /// Combined SHA-256 over all result hashes (order independent).
    pub results_hash: String,
}

impl HealthReport {
    /// Builds a report from a batch of named results.
    #[must_use]
    pub fn from_results(results: BTreeMap<String, HealthCheckResult>) -> Self {
        let mut counts = StatusCounts::default();
        for result in results.values() {
            match result.status {
                HealthStatus::Healthy => counts.healthy += 1,
                HealthStatus::Degraded => counts.degraded += 1,
                HealthStatus::Critical => counts.critical += 1,
                HealthStatus::Unknown => counts.unknown += 1,
                HealthStatus::Maintenance => counts.maintenance += 1,
            }
        }

        let overall_status = if counts.critical > 0 {
            HealthStatus::Critical
        } else if counts.degraded > 0 {
            HealthStatus::Degraded
        } else if results.is_empty() {
            HealthStatus::Unknown
        } else {
            HealthStatus::Healthy
        };

        let overall_score = if results.is_empty() {
            0.0
        } else {
            results.values().map(|r| r.score).sum::<f64>() / results.len() as f64
        };

        let hashes: Vec<&str> = results.values().map(|r| r.hash.as_str()).collect();
        let results_hash = combine_hashes(&hashes);

        Self {
            report_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            overall_status,
            overall_score,
            counts,
            results,
            results_hash,
        }
    }
}
