//! Chain-of-custody evidence logging for the Vigil platform.
//!
//! Every component of the platform records its decisions and observations
//! through this crate, producing an append-only, tamper-evident event
//! trail:
//!
//! - **Evidence Values**: a closed structured value type with canonical
//!   serialization, so hashing is deterministic
//! - **Hashed Events**: SHA-256 over (type, timestamp, payload), linked
//!   per stream through previous-hash pointers
//! - **Evidence Log**: per-stream ordered append with chain verification
//! - **Sinks**: pluggable durable backends (tracing-based by default)
//!
//! # Quick Start
//!
//! ```rust
//! use vigil_evidence::{EvidenceLog, EvidenceValue};
//!
//! let log = EvidenceLog::in_memory();
//!
//! log.append(
//!     "rollback/exec-1",
//!     "rollback_execution_started",
//!     EvidenceValue::map().with("strategy", "blue_green"),
//! );
//! log.append(
//!     "rollback/exec-1",
//!     "rollback_step_executed",
//!     EvidenceValue::map().with("step", "switch_traffic").with("success", true),
//! );
//!
//! let verification = log.verify_chain("rollback/exec-1").unwrap();
//! assert!(verification.intact);
//! ```
//!
//! # Modules
//!
//! - [`value`]: structured evidence values
//! - [`event`]: hashed evidence events
//! - [`log`]: the append-only evidence log
//! - [`sink`]: sink backends
//! - [`hash`]: SHA-256 helpers shared by the platform's forensic records

pub mod error;
pub mod event;
pub mod hash;
pub mod log;
pub mod sink;
pub mod value;

pub use error::{EvidenceError, Result};
pub use event::{EvidenceEvent, compute_event_hash};
pub use hash::{combine_hashes, sha256_hex};
pub use log::{ChainVerification, EvidenceLog};
pub use sink::{EvidenceSink, MemoryEvidenceSink, NoopEvidenceSink, TracingEvidenceSink};
pub use value::EvidenceValue;

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_value() -> impl Strategy<Value = EvidenceValue> {
        let leaf = prop_oneof![
            Just(EvidenceValue::Null),
            any::<bool>().prop_map(EvidenceValue::Bool),
            (-1.0e9f64..1.0e9).prop_map(EvidenceValue::Number),
            "[a-z0-9_]{0,12}".prop_map(EvidenceValue::String),
        ];
        leaf.prop_recursive(3, 24, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(EvidenceValue::Seq),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                    .prop_map(EvidenceValue::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn event_hash_is_deterministic(value in arb_value(), event_type in "[a-z_]{1,16}") {
            let timestamp = chrono::Utc::now();
            let a = compute_event_hash(&event_type, timestamp, &value);
            let b = compute_event_hash(&event_type, timestamp, &value);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn chains_always_verify_after_appends(payloads in prop::collection::vec(arb_value(), 1..12)) {
            let log = EvidenceLog::in_memory();
            for payload in payloads {
                log.append("stream", "event", payload);
            }
            let verification = log.verify_chain("stream").unwrap_or_else(|_| {
                panic!("stream should exist")
            });
            prop_assert!(verification.intact);
        }
    }
}
