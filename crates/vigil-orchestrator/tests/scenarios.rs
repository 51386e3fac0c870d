//! End-to-end monitoring and rollback scenarios.
//!
//! Each scenario wires the full platform with fixed data sources and an
//! in-memory evidence sink, runs monitoring cycles, and checks the
//! resulting decisions, executions, and reports.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use vigil_analysis::FindingSeverity;
use vigil_collectors::{
    FinanceThresholds, FixedManufacturingSource, FixedTradingSource,
    ManufacturingEfficiencyCollector, ManufacturingSnapshot, PharmaThresholds,
    TradingRevenueCollector, TradingSnapshot,
};
use vigil_decision::RollbackUrgency;
use vigil_evidence::MemoryEvidenceSink;
use vigil_metrics::ImpactLevel;
use vigil_notify::{MemoryNotificationChannel, NotificationChannel};
use vigil_orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig};
use vigil_rollback::{DriverRegistry, RollbackStatus, SimulatedDriver, StrategyKind};

struct Scenario {
    orchestrator: Orchestrator,
    notifications: Arc<MemoryNotificationChannel>,
}

fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        monitoring_interval_seconds: 1,
        enabled_industries: Vec::new(),
        ..OrchestratorConfig::default()
    }
}

/// Wires an orchestrator around fixed finance/pharma snapshots.
fn scenario(
    finance: Option<TradingSnapshot>,
    pharma: Option<ManufacturingSnapshot>,
) -> Scenario {
    let notifications = Arc::new(MemoryNotificationChannel::new());
    let mut builder = OrchestratorBuilder::new(test_config(), "deploy-2024-06-01")
        .with_evidence_sink(Arc::new(MemoryEvidenceSink::new()))
        .with_notification_channels(vec![
            Arc::clone(&notifications) as Arc<dyn NotificationChannel>
        ])
        .with_drivers(DriverRegistry::with_driver_for_all(Arc::new(
            SimulatedDriver::new(Duration::from_millis(2)),
        )));

    if let Some(snapshot) = finance {
        let baselines = builder.baselines();
        let evidence = builder.evidence();
        builder = builder.with_collector(Arc::new(TradingRevenueCollector::new(
            "deploy-2024-06-01",
            FinanceThresholds::default(),
            Arc::new(FixedTradingSource::new(snapshot)),
            baselines,
            evidence,
        )));
    }
    if let Some(snapshot) = pharma {
        let baselines = builder.baselines();
        let evidence = builder.evidence();
        builder = builder.with_collector(Arc::new(ManufacturingEfficiencyCollector::new(
            "deploy-2024-06-01",
            PharmaThresholds::default(),
            Arc::new(FixedManufacturingSource::new(snapshot)),
            baselines,
            evidence,
        )));
    }

    let orchestrator = builder
        .build()
        .unwrap_or_else(|_| panic!("orchestrator should build"));
    Scenario {
        orchestrator,
        notifications,
    }
}

#[tokio::test]
async fn s1_metrics_at_baseline_take_no_action() {
    let scenario = scenario(
        Some(TradingSnapshot::at_baseline(&FinanceThresholds::default())),
        None,
    );
    scenario.orchestrator.initialize().await;

    let report = scenario
        .orchestrator
        .run_cycle(1)
        .await
        .unwrap_or_else(|_| panic!("cycle should succeed"));

    assert_eq!(report.overall.impact_level, ImpactLevel::None);
    assert_eq!(report.overall.total_estimated_loss, Decimal::ZERO);
    assert!(!report.decision.rollback_recommended);
    assert!(!report.spawned_execution);
    assert!(scenario.notifications.is_empty());
}

#[tokio::test]
async fn s2_revenue_collapse_triggers_urgent_blue_green_rollback() {
    let thresholds = FinanceThresholds::default();
    let scenario = scenario(
        Some(TradingSnapshot {
            pnl_per_minute: Decimal::from(-9_000),
            ..TradingSnapshot::at_baseline(&thresholds)
        }),
        None,
    );
    scenario.orchestrator.initialize().await;

    let report = scenario
        .orchestrator
        .run_cycle(1)
        .await
        .unwrap_or_else(|_| panic!("cycle should succeed"));

    assert!(report.overall.impact_level >= ImpactLevel::High);
    assert_eq!(report.decision.urgency, RollbackUrgency::Urgent);
    assert!(report.decision.rollback_recommended);
    assert!(report.spawned_execution);

    let analyzed = scenario.orchestrator.drain_active().await;
    assert_eq!(analyzed.len(), 1);
    let (execution, _report) = &analyzed[0];

    assert_eq!(execution.strategy, StrategyKind::BlueGreen);
    assert_eq!(execution.status, RollbackStatus::Completed);
    assert_eq!(execution.execution_steps.len(), 3);
    assert!(execution.verify_timeline());

    // Start and completion notifications went out.
    assert!(scenario.notifications.len() >= 2);
}

#[tokio::test]
async fn s3_catastrophic_multi_system_failure_runs_full_stack() {
    let thresholds = FinanceThresholds::default();
    let scenario = scenario(
        Some(TradingSnapshot {
            failed_trades: 1_200,
            ..TradingSnapshot::at_baseline(&thresholds)
        }),
        Some(ManufacturingSnapshot {
            efficiency_percent: Decimal::from(45),
            ..ManufacturingSnapshot::nominal()
        }),
    );
    scenario.orchestrator.initialize().await;

    let report = scenario
        .orchestrator
        .run_cycle(1)
        .await
        .unwrap_or_else(|_| panic!("cycle should succeed"));

    assert_eq!(report.overall.impact_level, ImpactLevel::Catastrophic);
    assert!(report.overall.total_estimated_loss >= Decimal::from(1_200_000));
    assert_eq!(report.decision.urgency, RollbackUrgency::Emergency);
    assert!(report.decision.rollback_recommended);
    assert!(report.spawned_execution);

    let analyzed = scenario.orchestrator.drain_active().await;
    assert_eq!(analyzed.len(), 1);
    let (execution, post_report) = &analyzed[0];

    assert_eq!(execution.strategy, StrategyKind::FullStack);
    assert!(execution.execution_steps.len() >= 6);
    assert_eq!(execution.status, RollbackStatus::Completed);

    assert!(
        post_report
            .findings
            .iter()
            .any(|f| f.severity == FindingSeverity::Critical)
    );
}

#[tokio::test]
async fn concurrent_recommendation_is_suppressed_while_rollback_runs() {
    let thresholds = FinanceThresholds::default();
    let scenario = scenario(
        Some(TradingSnapshot {
            pnl_per_minute: Decimal::from(-9_000),
            ..TradingSnapshot::at_baseline(&thresholds)
        }),
        None,
    );
    scenario.orchestrator.initialize().await;

    let first = scenario
        .orchestrator
        .run_cycle(1)
        .await
        .unwrap_or_else(|_| panic!("cycle should succeed"));
    assert!(first.spawned_execution);

    // The rollback from cycle 1 is still in flight (or just finished);
    // a second positive decision in the same window must not spawn a
    // second execution.
    let second = scenario
        .orchestrator
        .run_cycle(2)
        .await
        .unwrap_or_else(|_| panic!("cycle should succeed"));

    if second.decision.rollback_recommended && second.spawned_execution {
        // The first execution already completed and was swept; that is a
        // legal second rollback, not an overlap.
        assert!(!second.analyzed.is_empty() || !first.spawned_execution);
    } else if second.decision.rollback_recommended {
        assert!(second.suppressed_reason.is_some());
    }

    let _ = scenario.orchestrator.drain_active().await;
}

#[tokio::test]
async fn decision_evidence_chain_stays_intact_across_cycles() {
    let scenario = scenario(
        Some(TradingSnapshot::at_baseline(&FinanceThresholds::default())),
        None,
    );
    scenario.orchestrator.initialize().await;

    for cycle in 1..=3 {
        let _ = scenario.orchestrator.run_cycle(cycle).await;
    }

    let verification = scenario
        .orchestrator
        .evidence()
        .verify_chain("decisions")
        .unwrap_or_else(|_| panic!("decision stream should exist"));
    assert!(verification.intact);
    assert_eq!(verification.events_checked, 3);
}
