//! Hashed evidence events.
//!
//! An [`EvidenceEvent`] is the chain-of-custody unit: an event type, a
//! timestamp, a structured payload, and a SHA-256 hash over the three.
//! Events appended to the same stream are linked through `previous_hash`,
//! so any later mutation of a stored event is detectable.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::sha256_hex;
use crate::value::EvidenceValue;

/// A single tamper-evident event in an evidence stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Event type tag (e.g. `rollback_step_executed`).
    pub event_type: String,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Structured event payload.
    pub data: EvidenceValue,
    /// SHA-256 over (event_type, timestamp, data).
    pub event_hash: String,
    /// Hash of the preceding event in the same stream, if any.
    pub previous_hash: Option<String>,
    /// Whether the configured sink accepted the event.
    ///
    /// A `false` value is a health signal, not an error: the event is
    /// still part of the in-memory chain and fully verifiable.
    pub persisted: bool,
}

impl EvidenceEvent {
    /// Creates a new event with its hash computed from the given fields.
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: EvidenceValue) -> Self {
        Self::at(event_type, Utc::now(), data)
    }

    /// Creates a new event with an explicit timestamp.
    #[must_use]
    pub fn at(
        event_type: impl Into<String>,
        timestamp: DateTime<Utc>,
        data: EvidenceValue,
    ) -> Self {
        let event_type = event_type.into();
        let event_hash = compute_event_hash(&event_type, timestamp, &data);

        Self {
            event_id: Uuid::new_v4(),
            event_type,
            timestamp,
            data,
            event_hash,
            previous_hash: None,
            persisted: true,
        }
    }

    /// Sets the previous-hash link.
    #[must_use]
    pub fn with_previous_hash(mut self, previous: impl Into<String>) -> Self {
        self.previous_hash = Some(previous.into());
        self
    }

    /// Recomputes the hash from the event's current fields and compares it
    /// to the stored hash.
    #[must_use]
    pub fn verify_hash(&self) -> bool {
        compute_event_hash(&self.event_type, self.timestamp, &self.data) == self.event_hash
    }
}

/// Computes the canonical hash of an event's identifying fields.
#[must_use]
pub fn compute_event_hash(
    event_type: &str,
    timestamp: DateTime<Utc>,
    data: &EvidenceValue,
) -> String {
    let content = EvidenceValue::map()
        .with("event_type", event_type)
        .with(
            "timestamp",
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .with("data", data.clone());

    sha256_hex(&content.canonical_json())
}
