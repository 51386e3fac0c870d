//! Probe registry and phased executor.
//!
//! The registry maps probe names to implementations and runs them with
//! per-probe timeouts, cooperative cancellation, baseline feeding, and
//! regression detection on probe duration and score.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vigil_baseline::BaselineStore;
use vigil_evidence::{EvidenceLog, EvidenceValue};
use vigil_regression::RegressionDetector;

use crate::probe::HealthProbe;
use crate::report::HealthReport;
use crate::types::{HealthCheckResult, HealthStatus, Severity};

/// Evidence stream all probe events are appended to.
const EVIDENCE_STREAM: &str = "health/probes";

/// Errors raised by the probe registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealthError {
    /// A probe name was registered twice. Fatal configuration error.
    #[error("Probe already registered: {name}")]
    DuplicateProbe {
        /// The duplicated name.
        name: String,
    },

    /// A referenced probe is not registered. Fatal configuration error.
    #[error("Probe not found: {name}")]
    ProbeNotFound {
        /// The missing name.
        name: String,
    },
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, HealthError>;

/// Configuration for probe execution.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Per-probe execution timeout.
    pub probe_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(30),
        }
    }
}

/// Registry and executor for named health probes.
pub struct ProbeRegistry {
    probes: HashMap<String, Arc<dyn HealthProbe>>,
    config: RegistryConfig,
    baselines: BaselineStore,
    detector: RegressionDetector,
    evidence: EvidenceLog,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("probes", &self.probes.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProbeRegistry {
    /// Creates a registry wired to the shared baseline store and evidence
    /// log.
    #[must_use]
    pub fn new(
        config: RegistryConfig,
        baselines: BaselineStore,
        detector: RegressionDetector,
        evidence: EvidenceLog,
    ) -> Self {
        Self {
            probes: HashMap::new(),
            config,
            baselines,
            detector,
            evidence,
            cancel: CancellationToken::new(),
        }
    }

    /// Registers a probe under a unique name.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::DuplicateProbe`] if the name is taken.
    pub fn register(&mut self, name: impl Into<String>, probe: Arc<dyn HealthProbe>) -> Result<()> {
        let name = name.into();
        if self.probes.contains_key(&name) {
            return Err(HealthError::DuplicateProbe { name });
        }

        self.evidence.append(
            EVIDENCE_STREAM,
            "health_check_registered",
            EvidenceValue::map()
                .with("check_name", name.clone())
                .with("component", probe.component()),
        );
        self.probes.insert(name, probe);
        Ok(())
    }

    /// Returns the registered probe names.
    #[must_use]
    pub fn probe_names(&self) -> Vec<String> {
        self.probes.keys().cloned().collect()
    }

    /// Returns the cancellation token governing in-flight probes.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Executes one probe by name.
    ///
    /// Probe errors and timeouts are converted into synthetic Critical
    /// results; cancellation yields an Unknown result. Duration and score
    /// are fed into the baseline store and checked for regression.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::ProbeNotFound`] for unknown names.
    pub async fn execute(&self, name: &str) -> Result<HealthCheckResult> {
        let probe = self
            .probes
            .get(name)
            .ok_or_else(|| HealthError::ProbeNotFound {
                name: name.to_string(),
            })?;

        let started = Instant::now();
        let outcome = tokio::select! {
            () = self.cancel.cancelled() => ProbeOutcome::Cancelled,
            result = tokio::time::timeout(self.config.probe_timeout, probe.execute()) => {
                match result {
                    Ok(Ok(result)) => ProbeOutcome::Finished(Box::new(result)),
                    Ok(Err(error)) => ProbeOutcome::Errored(error.to_string()),
                    Err(_) => ProbeOutcome::TimedOut,
                }
            }
        };
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let result = match outcome {
            ProbeOutcome::Finished(result) => *result,
            ProbeOutcome::Errored(message) => {
                warn!(probe = %name, error = %message, "probe raised an error");
                HealthCheckResult::builder(probe.component(), "error_handling")
                    .status(HealthStatus::Critical, 0.0)
                    .severity(Severity::Critical)
                    .evidence(EvidenceValue::map().with("exception", message.clone()))
                    .duration_ms(duration_ms)
                    .error_message(message)
                    .build()
            }
            ProbeOutcome::TimedOut => {
                warn!(probe = %name, timeout_ms = duration_ms, "probe timed out");
                HealthCheckResult::builder(probe.component(), "execution_timeout")
                    .status(HealthStatus::Critical, 0.0)
                    .severity(Severity::Critical)
                    .evidence(
                        EvidenceValue::map()
                            .with("timeout_ms", self.config.probe_timeout.as_millis() as f64),
                    )
                    .duration_ms(duration_ms)
                    .error_message("timeout")
                    .build()
            }
            ProbeOutcome::Cancelled => HealthCheckResult::builder(probe.component(), "cancelled")
                .status(HealthStatus::Unknown, 0.0)
                .severity(Severity::Medium)
                .duration_ms(duration_ms)
                .error_message("cancelled")
                .build(),
        };

        self.evidence.append(
            EVIDENCE_STREAM,
            "health_check_completed",
            EvidenceValue::map()
                .with("check_name", name)
                .with("status", result.status.as_str())
                .with("score", result.score)
                .with("duration_ms", result.duration_ms)
                .with("result_hash", result.hash.clone()),
        );

        self.track_performance(name, &result);
        Ok(result)
    }

    /// Executes all registered probes concurrently.
    pub async fn execute_all(&self) -> HashMap<String, HealthCheckResult> {
        let names: Vec<String> = self.probes.keys().cloned().collect();
        self.evidence.append(
            EVIDENCE_STREAM,
            "bulk_health_check_started",
            EvidenceValue::map().with("check_count", names.len()),
        );

        let results = self.execute_group(&names).await;

        self.evidence.append(
            EVIDENCE_STREAM,
            "bulk_health_check_completed",
            EvidenceValue::map()
                .with("check_count", results.len())
                .with(
                    "healthy_count",
                    results.values().filter(|r| r.is_healthy()).count(),
                )
                .with(
                    "critical_count",
                    results
                        .values()
                        .filter(|r| r.status == HealthStatus::Critical)
                        .count(),
                ),
        );

        results
    }

    /// Executes probes in ordered phases.
    ///
    /// Phases run sequentially; probes within one phase run concurrently.
    /// This lets infrastructure checks gate industry checks.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::ProbeNotFound`] if any phase references an
    /// unregistered probe; nothing is executed in that case.
    pub async fn execute_phased(
        &self,
        phases: &[Vec<String>],
    ) -> Result<HashMap<String, HealthCheckResult>> {
        for name in phases.iter().flatten() {
            if !self.probes.contains_key(name) {
                return Err(HealthError::ProbeNotFound { name: name.clone() });
            }
        }

        let mut all_results = HashMap::new();
        for (index, phase) in phases.iter().enumerate() {
            self.evidence.append(
                EVIDENCE_STREAM,
                "health_check_phase_started",
                EvidenceValue::map()
                    .with("phase", index)
                    .with("checks", phase.clone()),
            );

            let results = self.execute_group(phase).await;

            self.evidence.append(
                EVIDENCE_STREAM,
                "health_check_phase_completed",
                EvidenceValue::map()
                    .with("phase", index)
                    .with("completed", results.len()),
            );

            all_results.extend(results);

            if self.cancel.is_cancelled() {
                break;
            }
        }

        Ok(all_results)
    }

    /// Executes all probes and folds the results into a report.
    pub async fn comprehensive_report(&self) -> HealthReport {
        let results = self.execute_all().await;
        HealthReport::from_results(results.into_iter().collect())
    }

    /// Verifies a result's integrity, logging a violation event if it has
    /// been tampered with.
    pub fn verify_result(&self, result: &HealthCheckResult) -> bool {
        let intact = result.verify_integrity();
        if !intact {
            self.evidence.append(
                EVIDENCE_STREAM,
                "integrity_violation_detected",
                EvidenceValue::map()
                    .with("check_id", result.check_id.to_string())
                    .with("component", result.component.clone())
                    .with("recorded_hash", result.hash.clone()),
            );
        }
        intact
    }

    async fn execute_group(&self, names: &[String]) -> HashMap<String, HealthCheckResult> {
        let futures = names.iter().map(|name| async move {
            let result = self.execute(name).await;
            (name.clone(), result)
        });

        join_all(futures)
            .await
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(result) => Some((name, result)),
                Err(error) => {
                    warn!(probe = %name, %error, "probe lookup failed during group execution");
                    None
                }
            })
            .collect()
    }

    /// Feeds probe duration and score into the baseline store and emits
    /// regression evidence when a probe drifts from its own history.
    fn track_performance(&self, name: &str, result: &HealthCheckResult) {
        let duration_metric = format!("{name}.duration_ms");
        let score_metric = format!("{name}.score");

        self.baselines
            .record(&duration_metric, result.duration_ms, result.timestamp);
        self.baselines
            .record(&score_metric, result.score, result.timestamp);

        for metric in [duration_metric, score_metric] {
            let current = if metric.ends_with(".duration_ms") {
                result.duration_ms
            } else {
                result.score
            };
            let analysis = self.detector.analyze(&metric, current, &self.baselines);
            if analysis.is_regression {
                info!(
                    probe = %name,
                    metric = %metric,
                    value = current,
                    "performance regression detected"
                );
                self.evidence.append(
                    EVIDENCE_STREAM,
                    "performance_regression_detected",
                    EvidenceValue::map()
                        .with("check_name", name)
                        .with("metric", metric)
                        .with("current_value", current)
                        .with(
                            "max_severity",
                            analysis
                                .max_severity()
                                .map_or("none", |s| s.as_str()),
                        )
                        .with("confidence", analysis.max_confidence())
                        .with("methods", analysis.detections.len()),
                );
            }
        }
    }
}

enum ProbeOutcome {
    Finished(Box<HealthCheckResult>),
    Errored(String),
    TimedOut,
    Cancelled,
}
