//! Health check result types with forensic integrity.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_evidence::{EvidenceValue, sha256_hex};

/// Operational status of a checked component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// The component operates within expected bounds.
    Healthy,
    /// The component works but outside its normal envelope.
    Degraded,
    /// The component is failing or unreachable.
    Critical,
    /// The check could not determine a status.
    Unknown,
    /// The component is intentionally out of service.
    Maintenance,
}

impl HealthStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Degraded => "DEGRADED",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
            Self::Maintenance => "MAINTENANCE",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Incident severity attached to a health check result.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Routine observation.
    Low = 1,
    /// Worth investigating.
    Medium = 2,
    /// Requires prompt attention.
    High = 3,
    /// Requires immediate attention.
    Critical = 4,
    /// All-hands incident.
    Emergency = 5,
}

impl Severity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable result of one health probe execution.
///
/// The hash is computed over every field except itself when the result is
/// built; [`HealthCheckResult::verify_integrity`] recomputes it, so any
/// later mutation is detectable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Globally unique check execution id.
    pub check_id: Uuid,
    /// When the check completed.
    pub timestamp: DateTime<Utc>,
    /// Dotted component name (e.g. `infrastructure.system`).
    pub component: String,
    /// Kind of check performed.
    pub check_type: String,
    /// Observed status.
    pub status: HealthStatus,
    /// Health score in `[0, 100]`.
    pub score: f64,
    /// Incident severity.
    pub severity: Severity,
    /// Numeric observations captured by the check.
    pub metrics: BTreeMap<String, f64>,
    /// Structured supporting evidence.
    pub evidence: EvidenceValue,
    /// Wall-clock duration of the check in milliseconds.
    pub duration_ms: f64,
    /// Error message when the check failed.
    pub error_message: Option<String>,
    /// SHA-256 over the canonical serialization of all other fields.
    pub hash: String,
}

impl HealthCheckResult {
    /// Starts building a result for a component.
    #[must_use]
    pub fn builder(
        component: impl Into<String>,
        check_type: impl Into<String>,
    ) -> HealthCheckResultBuilder {
        HealthCheckResultBuilder::new(component, check_type)
    }

    /// Recomputes the hash from current field values and compares it to
    /// the stored hash.
    #[must_use]
    pub fn verify_integrity(&self) -> bool {
        compute_result_hash(self) == self.hash
    }

    /// Returns true if the check ended Healthy.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy)
    }
}

/// Computes the canonical hash of a result's fields (excluding the hash).
fn compute_result_hash(result: &HealthCheckResult) -> String {
    let mut metrics = EvidenceValue::map();
    for (name, value) in &result.metrics {
        metrics = metrics.with(name.clone(), *value);
    }

    let content = EvidenceValue::map()
        .with("check_id", result.check_id.to_string())
        .with(
            "timestamp",
            result.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .with("component", result.component.clone())
        .with("check_type", result.check_type.clone())
        .with("status", result.status.as_str())
        .with("score", result.score)
        .with("severity", result.severity.as_str())
        .with("metrics", metrics)
        .with("evidence", result.evidence.clone())
        .with("duration_ms", result.duration_ms)
        .with(
            "error_message",
            result
                .error_message
                .clone()
                .map_or(EvidenceValue::Null, EvidenceValue::String),
        );

    sha256_hex(&content.canonical_json())
}

/// Builder for [`HealthCheckResult`].
#[derive(Debug)]
pub struct HealthCheckResultBuilder {
    component: String,
    check_type: String,
    status: HealthStatus,
    score: f64,
    severity: Severity,
    metrics: BTreeMap<String, f64>,
    evidence: EvidenceValue,
    duration_ms: f64,
    error_message: Option<String>,
}

impl HealthCheckResultBuilder {
    fn new(component: impl Into<String>, check_type: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            check_type: check_type.into(),
            status: HealthStatus::Unknown,
            score: 0.0,
            severity: Severity::Low,
            metrics: BTreeMap::new(),
            evidence: EvidenceValue::map(),
            duration_ms: 0.0,
            error_message: None,
        }
    }

    /// Sets status and score together.
    #[must_use]
    pub fn status(mut self, status: HealthStatus, score: f64) -> Self {
        self.status = status;
        self.score = score.clamp(0.0, 100.0);
        self
    }

    /// Sets the severity.
    #[must_use]
    pub const fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Records one numeric metric.
    #[must_use]
    pub fn metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Attaches the structured evidence payload.
    #[must_use]
    pub fn evidence(mut self, evidence: EvidenceValue) -> Self {
        self.evidence = evidence;
        self
    }

    /// Sets the measured duration.
    #[must_use]
    pub const fn duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Sets the error message.
    #[must_use]
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Finalizes the result, stamping it and computing its hash.
    #[must_use]
    pub fn build(self) -> HealthCheckResult {
        let mut result = HealthCheckResult {
            check_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            component: self.component,
            check_type: self.check_type,
            status: self.status,
            score: self.score,
            severity: self.severity,
            metrics: self.metrics,
            evidence: self.evidence,
            duration_ms: self.duration_ms,
            error_message: self.error_message,
            hash: String::new(),
        };
        result.hash = compute_result_hash(&result);
        result
    }
}
