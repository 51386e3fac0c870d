//! Post-rollback forensic analysis for the Vigil platform.
//!
//! Once a rollback execution reaches a terminal state, the analyzer
//! reconstructs what happened and how well the platform responded:
//!
//! - **Root cause**: what degraded, at what impact level
//! - **Business impact**: estimated versus reconstructed actual loss,
//!   with an accuracy score
//! - **Rollback performance**: duration against the strategy's expected
//!   envelope, step success rate, error penalty
//! - **Communication**: notification emissions recovered from the
//!   execution's evidence stream
//! - **Compliance**: the five required checks (decision documented,
//!   evidence preserved, chronology valid, decision maker recorded,
//!   impact quantified)
//! - **Lessons learned**: a synthesis of the other findings
//!
//! Reports carry their own id and are hash-bound to the execution's
//! forensic timeline.

pub mod analyzer;
pub mod types;

pub use analyzer::{AnalyzerConfig, PostRollbackAnalyzer};
pub use types::{AnalysisFinding, AnalysisType, FindingSeverity, PostRollbackReport};
