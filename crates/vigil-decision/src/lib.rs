//! Policy-driven rollback decisions for the Vigil platform.
//!
//! The decision engine turns a cycle's aggregated business impact into a
//! [`RollbackDecision`]:
//!
//! - **Urgency ladder**: impact level and absolute loss map to an urgency
//!   tier, first match wins
//! - **Forcing rules**: compliance and security triggers demand immediate
//!   response; concurrent high-impact systems escalate one level
//! - **Confidence gate**: a recommendation only stands when the cycle's
//!   confidence clears the configured threshold
//! - **Chain of custody**: every decision, positive or negative, is
//!   hashed and appended to the evidence stream with its policy inputs

pub mod engine;
pub mod types;

pub use engine::{DecisionConfig, DecisionEngine};
pub use types::{RollbackDecision, RollbackUrgency};
