//! Rollback strategies and their step sequences.
//!
//! A strategy is a named ordered list of steps. Steps are abstract: the
//! executor delegates each one to the strategy's driver. Database steps
//! are critical; a critical step failure aborts the execution.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vigil_decision::RollbackUrgency;
use vigil_metrics::ImpactLevel;

/// The named rollback strategies the platform can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Gradual instance-by-instance rollback.
    Rolling,
    /// Atomic traffic switch to the previous environment.
    BlueGreen,
    /// Remove the canary and restore stable traffic.
    Canary,
    /// Restore database state from backup and verify.
    Database,
    /// Blue-green plus database plus external service notification.
    FullStack,
}

impl StrategyKind {
    /// Returns the strategy tag.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rolling => "rolling",
            Self::BlueGreen => "blue_green",
            Self::Canary => "canary",
            Self::Database => "database",
            Self::FullStack => "full_stack",
        }
    }

    /// All strategies, for driver-registry validation.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Rolling,
            Self::BlueGreen,
            Self::Canary,
            Self::Database,
            Self::FullStack,
        ]
    }

    /// Selects the strategy for a decision.
    ///
    /// Catastrophic emergencies take the full stack down to the database;
    /// anything urgent or worse switches traffic; the rest rolls
    /// gradually.
    #[must_use]
    pub fn select(urgency: RollbackUrgency, impact_level: ImpactLevel) -> Self {
        if urgency == RollbackUrgency::Emergency && impact_level == ImpactLevel::Catastrophic {
            Self::FullStack
        } else if urgency >= RollbackUrgency::Urgent {
            Self::BlueGreen
        } else {
            Self::Rolling
        }
    }

    /// The ordered step sequence for this strategy.
    #[must_use]
    pub fn steps(&self) -> Vec<StepSpec> {
        match self {
            Self::Rolling => vec![
                StepSpec::new("identify_previous_version"),
                StepSpec::new("issue_rollback"),
                StepSpec::new("wait_for_rollout"),
                StepSpec::new("verify_health"),
            ],
            Self::BlueGreen => vec![
                StepSpec::new("identify_environments"),
                StepSpec::new("switch_traffic"),
                StepSpec::new("verify_traffic_switch"),
            ],
            Self::Canary => vec![
                StepSpec::new("remove_canary"),
                StepSpec::new("restore_stable_traffic"),
            ],
            Self::Database => vec![
                StepSpec::new("create_backup").critical(),
                StepSpec::new("apply_rollback_script").critical(),
                StepSpec::new("verify_integrity").critical(),
            ],
            Self::FullStack => {
                let mut steps = Self::BlueGreen.steps();
                steps.extend(Self::Database.steps());
                steps.push(StepSpec::new("notify_external_services"));
                steps
            }
        }
    }

    /// Expected wall-clock duration for a complete run, used by the
    /// post-rollback analyzer to score execution speed.
    #[must_use]
    pub const fn expected_duration(&self) -> Duration {
        match self {
            Self::BlueGreen => Duration::from_secs(60),
            Self::Canary => Duration::from_secs(180),
            Self::Rolling => Duration::from_secs(300),
            Self::Database => Duration::from_secs(600),
            Self::FullStack => Duration::from_secs(900),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step within a strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name, unique within the strategy.
    pub name: String,
    /// Whether a failure of this step aborts the execution.
    pub critical: bool,
    /// Per-step timeout override in seconds, if any.
    pub timeout_secs: Option<u64>,
}

impl StepSpec {
    /// Creates a non-critical step with the default timeout.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            critical: false,
            timeout_secs: None,
        }
    }

    /// Marks the step critical.
    #[must_use]
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Overrides the per-step timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(RollbackUrgency::Emergency, ImpactLevel::Catastrophic, StrategyKind::FullStack; "catastrophic emergency")]
    #[test_case(RollbackUrgency::Emergency, ImpactLevel::Critical, StrategyKind::BlueGreen; "non catastrophic emergency")]
    #[test_case(RollbackUrgency::Immediate, ImpactLevel::Critical, StrategyKind::BlueGreen; "immediate")]
    #[test_case(RollbackUrgency::Urgent, ImpactLevel::High, StrategyKind::BlueGreen; "urgent")]
    #[test_case(RollbackUrgency::High, ImpactLevel::Medium, StrategyKind::Rolling; "high")]
    #[test_case(RollbackUrgency::Medium, ImpactLevel::Low, StrategyKind::Rolling; "medium")]
    fn selection(urgency: RollbackUrgency, level: ImpactLevel, expected: StrategyKind) {
        assert_eq!(StrategyKind::select(urgency, level), expected);
    }

    #[test]
    fn rolling_has_four_steps() {
        let steps = StrategyKind::Rolling.steps();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].name, "identify_previous_version");
        assert_eq!(steps[3].name, "verify_health");
        assert!(steps.iter().all(|s| !s.critical));
    }

    #[test]
    fn blue_green_has_three_steps() {
        let steps = StrategyKind::BlueGreen.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[1].name, "switch_traffic");
    }

    #[test]
    fn database_steps_are_all_critical() {
        let steps = StrategyKind::Database.steps();
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.critical));
    }

    #[test]
    fn full_stack_composes_blue_green_database_and_notify() {
        let steps = StrategyKind::FullStack.steps();
        assert_eq!(steps.len(), 7);
        assert_eq!(steps[0].name, "identify_environments");
        assert_eq!(steps[3].name, "create_backup");
        assert_eq!(steps[6].name, "notify_external_services");
        // Database steps keep their critical flag inside the composition.
        assert!(steps[3].critical && steps[4].critical && steps[5].critical);
        assert!(!steps[6].critical);
    }

    #[test]
    fn tags_are_stable() {
        assert_eq!(StrategyKind::Rolling.as_str(), "rolling");
        assert_eq!(StrategyKind::BlueGreen.as_str(), "blue_green");
        assert_eq!(StrategyKind::FullStack.as_str(), "full_stack");
    }
}
