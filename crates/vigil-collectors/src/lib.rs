//! Industry business-metric collectors for the Vigil platform.
//!
//! Two collectors plug into the [`vigil_metrics::MetricsCollector`]
//! contract, each behind a swappable data-source trait so tests and dry
//! runs can inject fixed observations:
//!
//! - **Finance trading** ([`TradingRevenueCollector`]): prices PnL
//!   shortfall, latency-attributed losses, and failed-trade costs against
//!   per-minute revenue tiers
//! - **Pharma manufacturing** ([`ManufacturingEfficiencyCollector`]):
//!   prices line-efficiency shortfall against the GMP floor and treats
//!   environmental excursions as compliance violations
//!
//! Both collectors seed their baselines into the shared
//! [`vigil_baseline::BaselineStore`] and record collection failures to the
//! evidence log instead of failing.

pub mod finance;
pub mod pharma;

pub use finance::{
    FinanceThresholds, FixedTradingSource, SimulatedTradingSource, TradingDataSource,
    TradingRevenueCollector, TradingSnapshot,
};
pub use pharma::{
    FixedManufacturingSource, ManufacturingDataSource, ManufacturingEfficiencyCollector,
    ManufacturingSnapshot, ParameterRange, PharmaThresholds, SimulatedManufacturingSource,
};
