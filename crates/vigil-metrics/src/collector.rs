//! The pluggable metrics collector contract.

use async_trait::async_trait;

use crate::types::{BaselineSummary, BusinessImpactAssessment, BusinessMetric};

/// A named source of business metrics and impact assessments.
///
/// Implementations must not fail out of `collect_metrics`: on trouble they
/// return an empty batch and record an evidence event, so a broken data
/// source degrades the platform instead of stopping it. Likewise
/// `calculate_impact` must produce an assessment even for an empty batch
/// (`None` level, zero loss, zero confidence).
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    /// Unique collector name (e.g. `finance_trading`).
    fn name(&self) -> &str;

    /// Collects the current batch of business metrics.
    async fn collect_metrics(&self) -> Vec<BusinessMetric>;

    /// Converts a metric batch into an impact assessment.
    fn calculate_impact(&self, current_metrics: &[BusinessMetric]) -> BusinessImpactAssessment;

    /// Seeds the collector's baseline from historical (or simulated)
    /// data covering the last `hours_back` hours.
    async fn establish_baseline(&self, hours_back: u32) -> BaselineSummary;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    struct EmptyCollector;

    #[async_trait]
    impl MetricsCollector for EmptyCollector {
        fn name(&self) -> &str {
            "empty"
        }

        async fn collect_metrics(&self) -> Vec<BusinessMetric> {
            Vec::new()
        }

        fn calculate_impact(&self, _current: &[BusinessMetric]) -> BusinessImpactAssessment {
            BusinessImpactAssessment::none("deploy-test")
        }

        async fn establish_baseline(&self, hours_back: u32) -> BaselineSummary {
            BaselineSummary {
                hours_back,
                ..Default::default()
            }
        }
    }

    #[tokio::test]
    async fn trait_objects_are_usable() {
        let collector: Box<dyn MetricsCollector> = Box::new(EmptyCollector);

        assert_eq!(collector.name(), "empty");
        assert!(collector.collect_metrics().await.is_empty());

        let assessment = collector.calculate_impact(&[]);
        assert_eq!(assessment.estimated_loss, Decimal::ZERO);

        let summary = collector.establish_baseline(24).await;
        assert_eq!(summary.hours_back, 24);
    }
}
