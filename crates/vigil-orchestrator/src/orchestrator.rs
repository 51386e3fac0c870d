//! The top-level orchestration loop.
//!
//! Each monitoring cycle collects business metrics from every registered
//! collector, assesses impact, asks the decision engine for a verdict,
//! hands positive decisions to the rollback executor without blocking, and
//! analyzes executions as they reach terminal states. Health probes run on
//! a slower cadence and feed the decision engine as ancillary evidence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;
use vigil_analysis::{AnalyzerConfig, PostRollbackAnalyzer, PostRollbackReport};
use vigil_baseline::{BaselineConfig, BaselineStore};
use vigil_collectors::{
    ManufacturingEfficiencyCollector, SimulatedManufacturingSource, SimulatedTradingSource,
    TradingRevenueCollector,
};
use vigil_decision::{DecisionConfig, DecisionEngine, RollbackDecision};
use vigil_evidence::{EvidenceLog, EvidenceSink, EvidenceValue, TracingEvidenceSink};
use vigil_health::{HealthError, HealthProbe, HealthReport, ProbeRegistry, RegistryConfig};
use vigil_metrics::{BusinessImpactAssessment, MetricsCollector, OverallImpact};
use vigil_notify::{NotificationChannel, NotificationDispatcher, TracingNotificationChannel};
use vigil_regression::{DetectorConfig, RegressionDetector};
use vigil_rollback::{
    DriverRegistry, ExecutorConfig, RollbackExecution, RollbackExecutor, RollbackStatus,
    SimulatedDriver,
};

use crate::config::{Industry, OrchestratorConfig};

/// Evidence stream for orchestrator lifecycle events.
const EVIDENCE_STREAM: &str = "orchestrator";

/// Errors raised while assembling an orchestrator.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Two collectors share a name. Fatal configuration error.
    #[error("Collector already registered: {name}")]
    DuplicateCollector {
        /// The duplicated name.
        name: String,
    },

    /// Probe registration failed.
    #[error(transparent)]
    Probe(#[from] HealthError),

    /// Rollback executor configuration failed.
    #[error(transparent)]
    Rollback(#[from] vigil_rollback::RollbackError),
}

/// Outcome of one monitoring cycle.
#[derive(Debug)]
pub struct CycleReport {
    /// Cycle sequence number.
    pub cycle: u64,
    /// Per-collector assessments produced this cycle.
    pub assessments: Vec<BusinessImpactAssessment>,
    /// Aggregated impact across collectors.
    pub overall: OverallImpact,
    /// The decision the cycle produced.
    pub decision: RollbackDecision,
    /// Execution spawned by this cycle, if any.
    pub spawned_execution: bool,
    /// Reason a positive decision was suppressed, if it was.
    pub suppressed_reason: Option<String>,
    /// Health report, on probe cycles.
    pub health: Option<HealthReport>,
    /// Executions that reached a terminal state and were analyzed.
    pub analyzed: Vec<(RollbackExecution, PostRollbackReport)>,
}

/// Builder wiring the platform's components together.
///
/// Collectors, probes, drivers, sinks, and channels are all registered at
/// construction time; duplicate names are startup failures.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    deployment_id: String,
    evidence: EvidenceLog,
    baselines: BaselineStore,
    notification_channels: Vec<Arc<dyn NotificationChannel>>,
    driver_registry: Option<DriverRegistry>,
    collectors: Vec<Arc<dyn MetricsCollector>>,
    probes: Vec<(String, Arc<dyn HealthProbe>)>,
    probe_phases: Vec<Vec<String>>,
}

impl OrchestratorBuilder {
    /// Starts a builder for the given deployment.
    #[must_use]
    pub fn new(config: OrchestratorConfig, deployment_id: impl Into<String>) -> Self {
        let baselines = BaselineStore::new(
            BaselineConfig::new()
                .with_window_hours(config.baseline_window_hours)
                .with_minimum_samples(config.baseline_minimum_samples),
        );

        Self {
            config,
            deployment_id: deployment_id.into(),
            evidence: EvidenceLog::new(Arc::new(TracingEvidenceSink::new())),
            baselines,
            notification_channels: vec![Arc::new(TracingNotificationChannel::new())],
            driver_registry: None,
            collectors: Vec::new(),
            probes: Vec::new(),
            probe_phases: Vec::new(),
        }
    }

    /// Replaces the evidence sink. Call before taking [`Self::evidence`]
    /// handles for externally constructed components.
    #[must_use]
    pub fn with_evidence_sink(mut self, sink: Arc<dyn EvidenceSink>) -> Self {
        self.evidence = EvidenceLog::new(sink);
        self
    }

    /// A handle to the shared evidence log, for wiring collectors and
    /// probes constructed outside the builder.
    #[must_use]
    pub fn evidence(&self) -> EvidenceLog {
        self.evidence.clone()
    }

    /// A handle to the shared baseline store.
    #[must_use]
    pub fn baselines(&self) -> BaselineStore {
        self.baselines.clone()
    }

    /// Replaces the notification channels.
    #[must_use]
    pub fn with_notification_channels(
        mut self,
        channels: Vec<Arc<dyn NotificationChannel>>,
    ) -> Self {
        self.notification_channels = channels;
        self
    }

    /// Replaces the strategy driver registry.
    #[must_use]
    pub fn with_drivers(mut self, drivers: DriverRegistry) -> Self {
        self.driver_registry = Some(drivers);
        self
    }

    /// Registers a metrics collector.
    #[must_use]
    pub fn with_collector(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.collectors.push(collector);
        self
    }

    /// Registers a health probe.
    #[must_use]
    pub fn with_probe(mut self, name: impl Into<String>, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push((name.into(), probe));
        self
    }

    /// Sets the probe execution phases. Defaults to one phase holding
    /// every registered probe.
    #[must_use]
    pub fn with_probe_phases(mut self, phases: Vec<Vec<String>>) -> Self {
        self.probe_phases = phases;
        self
    }

    /// Assembles the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] for duplicate collector or probe names and
    /// for incomplete driver registries.
    pub fn build(self) -> Result<Orchestrator, BuildError> {
        let evidence = self.evidence;
        let baselines = self.baselines;
        let detector = RegressionDetector::new(
            DetectorConfig::new()
                .with_threshold_percent(self.config.regression_threshold_percent),
        );

        // Industry collectors configured but not explicitly registered get
        // simulated feeds.
        let mut collectors = self.collectors;
        let mut names: Vec<String> = collectors.iter().map(|c| c.name().to_string()).collect();
        for industry in &self.config.enabled_industries {
            let collector: Arc<dyn MetricsCollector> = match industry {
                Industry::Finance => Arc::new(TradingRevenueCollector::new(
                    self.deployment_id.clone(),
                    self.config.finance.clone(),
                    Arc::new(SimulatedTradingSource::new(self.config.finance.clone(), 1)),
                    baselines.clone(),
                    evidence.clone(),
                )),
                Industry::Pharma => Arc::new(ManufacturingEfficiencyCollector::new(
                    self.deployment_id.clone(),
                    self.config.pharma.clone(),
                    Arc::new(SimulatedManufacturingSource::new(2)),
                    baselines.clone(),
                    evidence.clone(),
                )),
            };
            if !names.iter().any(|n| n == collector.name()) {
                names.push(collector.name().to_string());
                collectors.push(collector);
            }
        }

        let mut seen = std::collections::HashSet::new();
        for name in &names {
            if !seen.insert(name.clone()) {
                return Err(BuildError::DuplicateCollector { name: name.clone() });
            }
        }

        let mut probe_registry = ProbeRegistry::new(
            RegistryConfig {
                probe_timeout: Duration::from_secs(self.config.probe_timeout_seconds),
            },
            baselines.clone(),
            detector,
            evidence.clone(),
        );
        for (name, probe) in self.probes {
            probe_registry.register(name, probe)?;
        }
        let probe_phases = if self.probe_phases.is_empty() {
            let mut all = probe_registry.probe_names();
            all.sort();
            vec![all]
        } else {
            self.probe_phases
        };

        let dispatcher = Arc::new(NotificationDispatcher::new(self.notification_channels));
        let drivers = self.driver_registry.unwrap_or_else(|| {
            DriverRegistry::with_driver_for_all(Arc::new(SimulatedDriver::default()))
        });
        let executor = RollbackExecutor::new(
            drivers,
            ExecutorConfig {
                step_timeout: Duration::from_secs(60),
                execution_timeout: Duration::from_secs(self.config.execution_timeout_seconds),
            },
            dispatcher,
            evidence.clone(),
        )?;

        let decisions = DecisionEngine::new(
            DecisionConfig {
                confidence_threshold: self.config.confidence_threshold,
                ..DecisionConfig::default()
            },
            evidence.clone(),
        );
        let analyzer = PostRollbackAnalyzer::new(AnalyzerConfig::default(), evidence.clone());

        Ok(Orchestrator {
            config: self.config,
            deployment_id: self.deployment_id,
            evidence,
            baselines,
            probes: Arc::new(probe_registry),
            probe_phases,
            collectors,
            decisions,
            executor: Arc::new(executor),
            analyzer,
            active: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancellationToken::new(),
            rollback_cancel: CancellationToken::new(),
        })
    }
}

/// The platform's outer loop: tick → collect → assess → decide → execute
/// → analyze.
pub struct Orchestrator {
    config: OrchestratorConfig,
    deployment_id: String,
    evidence: EvidenceLog,
    baselines: BaselineStore,
    probes: Arc<ProbeRegistry>,
    probe_phases: Vec<Vec<String>>,
    collectors: Vec<Arc<dyn MetricsCollector>>,
    decisions: DecisionEngine,
    executor: Arc<RollbackExecutor>,
    analyzer: PostRollbackAnalyzer,
    active: Arc<Mutex<HashMap<Uuid, JoinHandle<RollbackExecution>>>>,
    cancel: CancellationToken,
    rollback_cancel: CancellationToken,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("deployment_id", &self.deployment_id)
            .field(
                "collectors",
                &self.collectors.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("probe_phases", &self.probe_phases)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Returns the shared evidence log.
    #[must_use]
    pub const fn evidence(&self) -> &EvidenceLog {
        &self.evidence
    }

    /// Returns the shared baseline store.
    #[must_use]
    pub const fn baselines(&self) -> &BaselineStore {
        &self.baselines
    }

    /// Returns the token that stops the monitoring loop.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Establishes collector baselines and records startup evidence.
    pub async fn initialize(&self) {
        for collector in &self.collectors {
            let hours = u32::try_from(self.config.baseline_window_hours.max(1)).unwrap_or(24);
            let summary = collector.establish_baseline(hours).await;
            info!(
                collector = collector.name(),
                metrics = summary.metrics.len(),
                "collector baseline established"
            );
        }

        self.evidence.append(
            EVIDENCE_STREAM,
            "orchestrator_started",
            EvidenceValue::map()
                .with("deployment_id", self.deployment_id.clone())
                .with("collectors", self.collectors.len())
                .with("probes", self.probes.probe_names().len())
                .with(
                    "monitoring_interval_seconds",
                    self.config.monitoring_interval_seconds,
                ),
        );
    }

    /// Runs the monitoring loop until shutdown.
    ///
    /// A failing cycle is logged as evidence and the loop continues after
    /// a back-off; no downstream error terminates monitoring.
    pub async fn run(&self) {
        let interval = Duration::from_secs(self.config.monitoring_interval_seconds.max(1));
        let cycle_guard = interval * 2;
        let mut cycle: u64 = 0;

        info!(deployment_id = %self.deployment_id, "monitoring loop started");

        while !self.cancel.is_cancelled() {
            cycle += 1;

            let pause = match tokio::time::timeout(cycle_guard, self.run_cycle(cycle)).await {
                Ok(Ok(report)) => {
                    info!(
                        cycle,
                        impact_level = %report.overall.impact_level,
                        recommended = report.decision.rollback_recommended,
                        "monitoring cycle completed"
                    );
                    interval
                }
                Ok(Err(error)) => {
                    error!(cycle, %error, "monitoring cycle failed");
                    self.evidence.append(
                        EVIDENCE_STREAM,
                        "monitoring_cycle_failed",
                        EvidenceValue::map()
                            .with("cycle", cycle)
                            .with("error", error.to_string()),
                    );
                    interval * 2
                }
                Err(_) => {
                    error!(cycle, "monitoring cycle exceeded its guard timeout");
                    self.evidence.append(
                        EVIDENCE_STREAM,
                        "monitoring_cycle_timeout",
                        EvidenceValue::map().with("cycle", cycle),
                    );
                    interval * 2
                }
            };

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }

        self.shutdown().await;
    }

    /// Executes one monitoring cycle.
    ///
    /// # Errors
    ///
    /// Propagates unexpected internal failures for the loop to log; a
    /// degraded collector or probe is not an error.
    pub async fn run_cycle(&self, cycle: u64) -> anyhow::Result<CycleReport> {
        // 1. Collect from every collector concurrently.
        let collector_timeout = Duration::from_secs(self.config.collector_timeout_seconds);
        let batches = join_all(self.collectors.iter().map(|collector| async move {
            let metrics =
                match tokio::time::timeout(collector_timeout, collector.collect_metrics()).await {
                    Ok(metrics) => metrics,
                    Err(_) => {
                        warn!(collector = collector.name(), "metric collection timed out");
                        self.evidence.append(
                            EVIDENCE_STREAM,
                            "metric_collection_timed_out",
                            EvidenceValue::map().with("collector", collector.name()),
                        );
                        Vec::new()
                    }
                };
            (Arc::clone(collector), metrics)
        }))
        .await;

        // Feed every observation into the baseline store.
        for (_, metrics) in &batches {
            for metric in metrics {
                self.baselines.record(
                    &metric.name,
                    metric.value.to_f64().unwrap_or(0.0),
                    metric.timestamp,
                );
            }
        }

        // 2. Per-collector impact assessment.
        let assessments: Vec<BusinessImpactAssessment> = batches
            .iter()
            .map(|(collector, metrics)| collector.calculate_impact(metrics))
            .collect();

        // 3. Aggregate.
        let overall = OverallImpact::aggregate(&assessments);

        // 4. Probe-derived ancillary evidence on the slower cadence.
        let health = if cycle % self.config.probe_cycle_interval.max(1) == 0
            && !self.probes.probe_names().is_empty()
        {
            let results = self.probes.execute_phased(&self.probe_phases).await?;
            Some(HealthReport::from_results(results.into_iter().collect()))
        } else {
            None
        };
        let ancillary = health.as_ref().map_or_else(
            || EvidenceValue::Null,
            |report| {
                EvidenceValue::map()
                    .with("overall_status", report.overall_status.as_str())
                    .with("overall_score", report.overall_score)
                    .with("critical_count", report.counts.critical)
                    .with("results_hash", report.results_hash.clone())
            },
        );

        // 5. Decide.
        let decision = self.decisions.decide(&overall, &assessments, ancillary);

        // 6. Execute without blocking the loop.
        let mut spawned_execution = false;
        let mut suppressed_reason = None;
        if decision.rollback_recommended {
            if self.has_active_rollback() {
                let reason = "an active rollback is already in progress for this deployment";
                self.decisions.record_suppression(&decision, reason);
                suppressed_reason = Some(reason.to_string());
            } else {
                self.spawn_rollback(decision.clone());
                spawned_execution = true;
            }
        }

        // 7. Sweep terminal executions and analyze them.
        let analyzed = self.sweep_finished().await;

        Ok(CycleReport {
            cycle,
            assessments,
            overall,
            decision,
            spawned_execution,
            suppressed_reason,
            health,
            analyzed,
        })
    }

    /// Awaits all in-flight rollbacks and returns their analyses. Useful
    /// for tests and controlled shutdown.
    pub async fn drain_active(&self) -> Vec<(RollbackExecution, PostRollbackReport)> {
        let handles: Vec<JoinHandle<RollbackExecution>> = {
            let mut active = self.active.lock();
            active.drain().map(|(_, handle)| handle).collect()
        };

        let mut analyzed = Vec::new();
        for handle in handles {
            if let Ok(execution) = handle.await {
                let report = self.analyzer.analyze(&execution);
                analyzed.push((execution, report));
            }
        }
        analyzed
    }

    fn has_active_rollback(&self) -> bool {
        let active = self.active.lock();
        active.values().any(|handle| !handle.is_finished())
    }

    fn spawn_rollback(&self, decision: RollbackDecision) {
        let executor = Arc::clone(&self.executor);
        let deployment_id = self.deployment_id.clone();
        let token = self.rollback_cancel.child_token();
        let decision_id = decision.decision_id;

        let handle = tokio::spawn(async move {
            let strategy = vigil_rollback::StrategyKind::select(
                decision.urgency,
                decision.business_impact.impact_level,
            );
            executor
                .execute_strategy(decision, &deployment_id, strategy, &token)
                .await
        });

        let mut active = self.active.lock();
        active.insert(decision_id, handle);
        info!(%decision_id, "rollback execution spawned");
    }

    async fn sweep_finished(&self) -> Vec<(RollbackExecution, PostRollbackReport)> {
        let finished: Vec<JoinHandle<RollbackExecution>> = {
            let mut active = self.active.lock();
            let done_ids: Vec<Uuid> = active
                .iter()
                .filter(|(_, handle)| handle.is_finished())
                .map(|(id, _)| *id)
                .collect();
            done_ids
                .into_iter()
                .filter_map(|id| active.remove(&id))
                .collect()
        };

        let mut analyzed = Vec::new();
        for handle in finished {
            match handle.await {
                Ok(execution) => {
                    let report = self.analyzer.analyze(&execution);
                    self.evidence.append(
                        EVIDENCE_STREAM,
                        "rollback_analyzed",
                        EvidenceValue::map()
                            .with("execution_id", execution.execution_id.to_string())
                            .with("final_status", execution.status.as_str())
                            .with("report_id", report.report_id.to_string()),
                    );
                    analyzed.push((execution, report));
                }
                Err(error) => {
                    error!(%error, "rollback task failed to join");
                    self.evidence.append(
                        EVIDENCE_STREAM,
                        "rollback_task_failed",
                        EvidenceValue::map().with("error", error.to_string()),
                    );
                }
            }
        }
        analyzed
    }

    /// Stops scheduling, cancels in-flight probes, and gives active
    /// rollbacks a grace window before cancelling them.
    async fn shutdown(&self) {
        info!("orchestrator shutting down");
        self.probes.cancel_token().cancel();

        let grace = Duration::from_secs(self.config.shutdown_grace_seconds);
        let deadline = tokio::time::Instant::now() + grace;

        loop {
            if !self.has_active_rollback() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("grace window elapsed; cancelling active rollbacks");
                self.rollback_cancel.cancel();
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let analyzed = self.drain_active().await;
        for (execution, _) in &analyzed {
            if execution.status == RollbackStatus::Cancelled {
                self.evidence.append(
                    EVIDENCE_STREAM,
                    "rollback_cancelled_by_shutdown",
                    EvidenceValue::map()
                        .with("execution_id", execution.execution_id.to_string()),
                );
            }
        }

        self.evidence.append(
            EVIDENCE_STREAM,
            "orchestrator_stopped",
            EvidenceValue::map().with("deployment_id", self.deployment_id.clone()),
        );
    }
}
