//! The append-only evidence log.
//!
//! The [`EvidenceLog`] maintains one hash-linked chain of events per
//! stream. Appends are serialized per stream; chains can be re-verified at
//! any time by recomputing every hash and checking the linkage.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EvidenceError, Result};
use crate::event::EvidenceEvent;
use crate::sink::{EvidenceSink, NoopEvidenceSink};
use crate::value::EvidenceValue;

/// Outcome of verifying a stream's hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// Whether every hash and link checked out.
    pub intact: bool,
    /// Index of the first event that failed verification, if any.
    pub first_broken_at: Option<usize>,
    /// Number of events examined.
    pub events_checked: usize,
}

impl ChainVerification {
    /// A verification result for an intact chain of the given length.
    #[must_use]
    pub const fn intact(events_checked: usize) -> Self {
        Self {
            intact: true,
            first_broken_at: None,
            events_checked,
        }
    }

    /// A verification result reporting the first broken position.
    #[must_use]
    pub const fn broken_at(position: usize, events_checked: usize) -> Self {
        Self {
            intact: false,
            first_broken_at: Some(position),
            events_checked,
        }
    }
}

/// Append-only, tamper-evident event log shared across components.
///
/// Cloning the log produces a handle to the same underlying streams.
/// Append order is guaranteed per stream; no ordering is guaranteed across
/// streams.
#[derive(Debug)]
pub struct EvidenceLog {
    streams: Arc<RwLock<HashMap<String, Arc<Mutex<Vec<EvidenceEvent>>>>>>,
    sink: Arc<dyn EvidenceSink>,
}

impl EvidenceLog {
    /// Creates a log backed by the given sink.
    #[must_use]
    pub fn new(sink: Arc<dyn EvidenceSink>) -> Self {
        Self {
            streams: Arc::new(RwLock::new(HashMap::new())),
            sink,
        }
    }

    /// Creates a log with no external sink.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(NoopEvidenceSink::new()))
    }

    /// Appends an event to a stream and returns the stored event.
    ///
    /// The event hash is computed over (type, timestamp, data); the
    /// previous-hash link is taken from the stream's last event. If the
    /// sink rejects the write the event is still chained and returned,
    /// flagged `persisted = false`.
    pub fn append(
        &self,
        stream_id: &str,
        event_type: impl Into<String>,
        data: EvidenceValue,
    ) -> EvidenceEvent {
        let stream = self.stream_handle(stream_id);

        // Per-stream lock serializes concurrent appenders.
        let mut events = stream.lock();

        let mut event = EvidenceEvent::new(event_type, data);
        if let Some(last) = events.last() {
            event = event.with_previous_hash(last.event_hash.clone());
        }

        if let Err(error) = self.sink.append(stream_id, &event) {
            warn!(
                stream = %stream_id,
                event_type = %event.event_type,
                %error,
                "evidence sink rejected write; event retained in memory"
            );
            event.persisted = false;
        }

        events.push(event.clone());
        event
    }

    /// Recomputes every hash in a stream and checks previous-hash linkage.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceError::StreamNotFound`] for unknown streams.
    pub fn verify_chain(&self, stream_id: &str) -> Result<ChainVerification> {
        let stream = {
            let streams = self.streams.read();
            streams
                .get(stream_id)
                .cloned()
                .ok_or_else(|| EvidenceError::StreamNotFound {
                    stream_id: stream_id.to_string(),
                })?
        };

        let events = stream.lock();
        let mut previous_hash: Option<&str> = None;

        for (index, event) in events.iter().enumerate() {
            if !event.verify_hash() {
                return Ok(ChainVerification::broken_at(index, events.len()));
            }
            if event.previous_hash.as_deref() != previous_hash {
                return Ok(ChainVerification::broken_at(index, events.len()));
            }
            previous_hash = Some(event.event_hash.as_str());
        }

        Ok(ChainVerification::intact(events.len()))
    }

    /// Returns a copy of all events in a stream (empty for unknown streams).
    #[must_use]
    pub fn stream_events(&self, stream_id: &str) -> Vec<EvidenceEvent> {
        let streams = self.streams.read();
        streams
            .get(stream_id)
            .map(|s| s.lock().clone())
            .unwrap_or_default()
    }

    /// Returns the number of events in a stream.
    #[must_use]
    pub fn stream_len(&self, stream_id: &str) -> usize {
        let streams = self.streams.read();
        streams.get(stream_id).map_or(0, |s| s.lock().len())
    }

    /// Returns the ids of all known streams.
    #[must_use]
    pub fn stream_ids(&self) -> Vec<String> {
        self.streams.read().keys().cloned().collect()
    }

    /// Overwrites an event in place. Test-only tampering hook.
    #[cfg(test)]
    pub(crate) fn tamper(&self, stream_id: &str, index: usize, data: EvidenceValue) {
        let stream = self.stream_handle(stream_id);
        let mut events = stream.lock();
        if let Some(event) = events.get_mut(index) {
            event.data = data;
        }
    }

    fn stream_handle(&self, stream_id: &str) -> Arc<Mutex<Vec<EvidenceEvent>>> {
        if let Some(stream) = self.streams.read().get(stream_id) {
            return Arc::clone(stream);
        }

        let mut streams = self.streams.write();
        Arc::clone(streams.entry(stream_id.to_string()).or_default())
    }
}

impl Clone for EvidenceLog {
    fn clone(&self) -> Self {
        Self {
            streams: Arc::clone(&self.streams),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl Default for EvidenceLog {
    fn default() -> Self {
        Self::in_memory()
    }
}
