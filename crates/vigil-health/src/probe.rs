//! The health probe contract and built-in probes.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sysinfo::System;
use tokio::net::TcpStream;
use vigil_evidence::EvidenceValue;

use crate::types::{HealthCheckResult, HealthStatus, Severity};

/// A named operation that produces a [`HealthCheckResult`].
///
/// Implementations should return `Err` for unexpected failures; the
/// executor converts errors into synthetic Critical results and never
/// propagates them.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// The dotted component name this probe validates.
    fn component(&self) -> &str;

    /// Executes the probe.
    async fn execute(&self) -> anyhow::Result<HealthCheckResult>;
}

/// Host resource probe backed by `sysinfo`.
///
/// Scores CPU, memory, and load against fixed thresholds and degrades the
/// result as resources saturate.
#[derive(Debug, Clone)]
pub struct SystemResourcesProbe {
    component: String,
    /// CPU usage percent above which the host counts as saturated.
    pub cpu_critical_percent: f64,
    /// Memory usage percent above which the host counts as saturated.
    pub memory_critical_percent: f64,
}

impl SystemResourcesProbe {
    /// Creates a probe with default thresholds (CPU 90%, memory 90%).
    #[must_use]
    pub fn new() -> Self {
        Self {
            component: "infrastructure.system".to_string(),
            cpu_critical_percent: 90.0,
            memory_critical_percent: 90.0,
        }
    }
}

impl Default for SystemResourcesProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for SystemResourcesProbe {
    fn component(&self) -> &str {
        &self.component
    }

    async fn execute(&self) -> anyhow::Result<HealthCheckResult> {
        let started = Instant::now();

        let mut system = System::new_all();
        system.refresh_cpu();
        // CPU usage needs two samples a short interval apart.
        tokio::time::sleep(Duration::from_millis(200)).await;
        system.refresh_cpu();
        system.refresh_memory();

        let cpu_usage = f64::from(system.global_cpu_info().cpu_usage());
        let total_memory = system.total_memory();
        let used_memory = system.used_memory();
        let memory_usage = if total_memory > 0 {
            used_memory as f64 / total_memory as f64 * 100.0
        } else {
            0.0
        };
        let load = System::load_average();

        let mut score = 100.0;
        if cpu_usage > self.cpu_critical_percent {
            score -= 40.0;
        } else if cpu_usage > self.cpu_critical_percent - 15.0 {
            score -= 20.0;
        }
        if memory_usage > self.memory_critical_percent {
            score -= 40.0;
        } else if memory_usage > self.memory_critical_percent - 15.0 {
            score -= 20.0;
        }

        let (status, severity) = if score < 50.0 {
            (HealthStatus::Critical, Severity::Critical)
        } else if score < 90.0 {
            (HealthStatus::Degraded, Severity::Medium)
        } else {
            (HealthStatus::Healthy, Severity::Low)
        };

        Ok(HealthCheckResult::builder(&self.component, "system_resources")
            .status(status, score)
            .severity(severity)
            .metric("cpu_usage_percent", cpu_usage)
            .metric("memory_usage_percent", memory_usage)
            .metric("load_average_1m", load.one)
            .evidence(
                EvidenceValue::map()
                    .with("total_memory_bytes", total_memory as f64)
                    .with("used_memory_bytes", used_memory as f64)
                    .with("cpu_threshold_percent", self.cpu_critical_percent)
                    .with("memory_threshold_percent", self.memory_critical_percent),
            )
            .duration_ms(started.elapsed().as_secs_f64() * 1000.0)
            .build())
    }
}

/// TCP reachability probe for one endpoint.
#[derive(Debug, Clone)]
pub struct NetworkReachabilityProbe {
    component: String,
    address: SocketAddr,
    connect_timeout: Duration,
}

impl NetworkReachabilityProbe {
    /// Creates a probe for an endpoint with a 5 second connect timeout.
    #[must_use]
    pub fn new(component: impl Into<String>, address: SocketAddr) -> Self {
        Self {
            component: component.into(),
            address,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl HealthProbe for NetworkReachabilityProbe {
    fn component(&self) -> &str {
        &self.component
    }

    async fn execute(&self) -> anyhow::Result<HealthCheckResult> {
        let started = Instant::now();
        let attempt = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(self.address),
        )
        .await;
        let connect_ms = started.elapsed().as_secs_f64() * 1000.0;

        let builder = HealthCheckResult::builder(&self.component, "network_reachability")
            .metric("connect_time_ms", connect_ms)
            .evidence(
                EvidenceValue::map()
                    .with("address", self.address.to_string())
                    .with("timeout_ms", self.connect_timeout.as_millis() as f64),
            )
            .duration_ms(connect_ms);

        let result = match attempt {
            Ok(Ok(_stream)) => builder
                .status(HealthStatus::Healthy, 100.0)
                .severity(Severity::Low)
                .build(),
            Ok(Err(error)) => builder
                .status(HealthStatus::Critical, 0.0)
                .severity(Severity::High)
                .error_message(format!("connect failed: {error}"))
                .build(),
            Err(_) => builder
                .status(HealthStatus::Critical, 0.0)
                .severity(Severity::High)
                .error_message("connect timeout")
                .build(),
        };

        Ok(result)
    }
}

/// Reachability quorum over a set of cluster node endpoints.
///
/// Scores by the fraction of reachable nodes; losing quorum is Critical.
#[derive(Debug, Clone)]
pub struct ClusterQuorumProbe {
    component: String,
    nodes: Vec<SocketAddr>,
    connect_timeout: Duration,
}

impl ClusterQuorumProbe {
    /// Creates a probe over the given node endpoints.
    #[must_use]
    pub fn new(component: impl Into<String>, nodes: Vec<SocketAddr>) -> Self {
        Self {
            component: component.into(),
            nodes,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl HealthProbe for ClusterQuorumProbe {
    fn component(&self) -> &str {
        &self.component
    }

    async fn execute(&self) -> anyhow::Result<HealthCheckResult> {
        let started = Instant::now();

        let mut reachable = 0_usize;
        let mut unreachable_nodes = Vec::new();
        for node in &self.nodes {
            let attempt =
                tokio::time::timeout(self.connect_timeout, TcpStream::connect(node)).await;
            if matches!(attempt, Ok(Ok(_))) {
                reachable += 1;
            } else {
                unreachable_nodes.push(node.to_string());
            }
        }

        let total = self.nodes.len();
        let fraction = if total == 0 {
            0.0
        } else {
            reachable as f64 / total as f64
        };
        let score = fraction * 100.0;
        let has_quorum = reachable * 2 > total;

        let (status, severity) = if total == 0 {
            (HealthStatus::Unknown, Severity::Medium)
        } else if !has_quorum {
            (HealthStatus::Critical, Severity::Critical)
        } else if reachable < total {
            (HealthStatus::Degraded, Severity::Medium)
        } else {
            (HealthStatus::Healthy, Severity::Low)
        };

        Ok(HealthCheckResult::builder(&self.component, "cluster_quorum")
            .status(status, score)
            .severity(severity)
            .metric("nodes_total", total as f64)
            .metric("nodes_reachable", reachable as f64)
            .evidence(
                EvidenceValue::map()
                    .with("unreachable_nodes", unreachable_nodes)
                    .with("has_quorum", has_quorum),
            )
            .duration_ms(started.elapsed().as_secs_f64() * 1000.0)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn system_probe_produces_verified_result() {
        let probe = SystemResourcesProbe::new();
        let result = probe
            .execute()
            .await
            .unwrap_or_else(|_| panic!("system probe should not fail"));

        assert!(result.verify_integrity());
        assert!(result.metrics.contains_key("cpu_usage_percent"));
        assert!(result.metrics.contains_key("memory_usage_percent"));
        assert!(result.duration_ms > 0.0);
    }

    #[tokio::test]
    async fn network_probe_reports_unreachable_endpoint_as_critical() {
        // Reserved TEST-NET address: nothing listens there.
        let address: SocketAddr = "192.0.2.1:9".parse().unwrap_or_else(|_| {
            panic!("address should parse")
        });
        let probe = NetworkReachabilityProbe::new("infrastructure.network", address)
            .with_connect_timeout(Duration::from_millis(200));

        let result = probe
            .execute()
            .await
            .unwrap_or_else(|_| panic!("network probe should not fail"));

        assert_eq!(result.status, HealthStatus::Critical);
        assert!(result.error_message.is_some());
        assert!(result.verify_integrity());
    }

    #[tokio::test]
    async fn network_probe_reports_reachable_endpoint_as_healthy() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|_| panic!("bind should succeed"));
        let address = listener
            .local_addr()
            .unwrap_or_else(|_| panic!("addr should resolve"));

        let probe = NetworkReachabilityProbe::new("infrastructure.network", address);
        let result = probe
            .execute()
            .await
            .unwrap_or_else(|_| panic!("network probe should not fail"));

        assert_eq!(result.status, HealthStatus::Healthy);
        assert!((result.score - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn quorum_probe_degrades_with_partial_reachability() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|_| panic!("bind should succeed"));
        let live = listener
            .local_addr()
            .unwrap_or_else(|_| panic!("addr should resolve"));
        let dead: SocketAddr = "192.0.2.1:9".parse().unwrap_or_else(|_| {
            panic!("address should parse")
        });

        let probe = ClusterQuorumProbe {
            component: "infrastructure.cluster".to_string(),
            nodes: vec![live, live, dead],
            connect_timeout: Duration::from_millis(200),
        };

        let result = probe
            .execute()
            .await
            .unwrap_or_else(|_| panic!("quorum probe should not fail"));

        assert_eq!(result.status, HealthStatus::Degraded);
        assert!(result.metrics.get("nodes_reachable").copied() == Some(2.0));
    }

    #[tokio::test]
    async fn quorum_probe_without_nodes_is_unknown() {
        let probe = ClusterQuorumProbe::new("infrastructure.cluster", Vec::new());
        let result = probe
            .execute()
            .await
            .unwrap_or_else(|_| panic!("quorum probe should not fail"));
        assert_eq!(result.status, HealthStatus::Unknown);
    }
}
