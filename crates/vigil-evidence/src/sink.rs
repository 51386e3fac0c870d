//! Evidence sink backends.
//!
//! This module provides the [`EvidenceSink`] trait and default
//! implementations. Sinks are expected to be append-only and durable; the
//! evidence log tolerates transient sink failure by flagging the affected
//! event as not persisted.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{EvidenceError, Result};
use crate::event::EvidenceEvent;

/// Trait for evidence sink backends.
///
/// Implement this trait to create custom evidence destinations
/// (e.g. file, database, external audit service).
pub trait EvidenceSink: std::fmt::Debug + Send + Sync {
    /// Appends an event to the sink for the given stream.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceError::SinkUnavailable`] when the sink cannot
    /// accept the write. The caller treats this as a health signal.
    fn append(&self, stream_id: &str, event: &EvidenceEvent) -> Result<()>;
}

/// Evidence sink that writes through the `tracing` infrastructure.
///
/// Each event is emitted as a structured log line under the
/// `vigil_evidence` target, carrying the stream, event type, hash, and the
/// canonical JSON payload.
#[derive(Debug, Clone, Default)]
pub struct TracingEvidenceSink;

impl TracingEvidenceSink {
    /// Creates a new tracing-backed sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EvidenceSink for TracingEvidenceSink {
    fn append(&self, stream_id: &str, event: &EvidenceEvent) -> Result<()> {
        tracing::info!(
            target: "vigil_evidence",
            stream = %stream_id,
            event_type = %event.event_type,
            event_hash = %event.event_hash,
            previous_hash = event.previous_hash.as_deref().unwrap_or(""),
            payload = %event.data.canonical_json(),
            "evidence appended"
        );
        Ok(())
    }
}

/// A no-op sink for disabled scenarios.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvidenceSink;

impl NoopEvidenceSink {
    /// Creates a new no-op sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EvidenceSink for NoopEvidenceSink {
    fn append(&self, _stream_id: &str, _event: &EvidenceEvent) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink that records everything it receives.
///
/// Intended for tests and inspection; not bounded.
#[derive(Debug, Default)]
pub struct MemoryEvidenceSink {
    events: Mutex<HashMap<String, Vec<EvidenceEvent>>>,
    fail_writes: Mutex<bool>,
}

impl MemoryEvidenceSink {
    /// Creates a new empty memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes fail, simulating an unavailable sink.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.fail_writes.lock() = unavailable;
    }

    /// Returns a copy of all events recorded for a stream.
    #[must_use]
    pub fn stream(&self, stream_id: &str) -> Vec<EvidenceEvent> {
        self.events
            .lock()
            .get(stream_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of events recorded for a stream.
    #[must_use]
    pub fn stream_len(&self, stream_id: &str) -> usize {
        self.events.lock().get(stream_id).map_or(0, Vec::len)
    }

    /// Returns the total number of recorded events across all streams.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.events.lock().values().map(Vec::len).sum()
    }

    /// Returns true if any recorded event has the given type.
    #[must_use]
    pub fn contains_event_type(&self, event_type: &str) -> bool {
        self.events
            .lock()
            .values()
            .flatten()
            .any(|e| e.event_type == event_type)
    }
}

impl EvidenceSink for MemoryEvidenceSink {
    fn append(&self, stream_id: &str, event: &EvidenceEvent) -> Result<()> {
        if *self.fail_writes.lock() {
            return Err(EvidenceError::SinkUnavailable {
                reason: "memory sink marked unavailable".to_string(),
            });
        }

        self.events
            .lock()
            .entry(stream_id.to_string())
            .or_default()
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EvidenceValue;
    use std::sync::Arc;

    fn sample_event() -> EvidenceEvent {
        EvidenceEvent::new("test_event", EvidenceValue::map().with("n", 1.0))
    }

    #[test]
    fn tracing_sink_accepts_events() {
        let sink = TracingEvidenceSink::new();
        assert!(sink.append("stream-a", &sample_event()).is_ok());
    }

    #[test]
    fn noop_sink_accepts_events() {
        let sink = NoopEvidenceSink::new();
        assert!(sink.append("stream-a", &sample_event()).is_ok());
    }

    #[test]
    fn memory_sink_records_per_stream() {
        let sink = MemoryEvidenceSink::new();
        sink.append("a", &sample_event()).unwrap_or_default();
        sink.append("a", &sample_event()).unwrap_or_default();
        sink.append("b", &sample_event()).unwrap_or_default();

        assert_eq!(sink.stream_len("a"), 2);
        assert_eq!(sink.stream_len("b"), 1);
        assert_eq!(sink.total_len(), 3);
        assert!(sink.contains_event_type("test_event"));
    }

    #[test]
    fn memory_sink_can_simulate_outage() {
        let sink = MemoryEvidenceSink::new();
        sink.set_unavailable(true);
        assert!(sink.append("a", &sample_event()).is_err());

        sink.set_unavailable(false);
        assert!(sink.append("a", &sample_event()).is_ok());
    }

    #[test]
    fn sinks_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TracingEvidenceSink>();
        assert_send_sync::<NoopEvidenceSink>();
        assert_send_sync::<MemoryEvidenceSink>();
        assert_send_sync::<Arc<dyn EvidenceSink>>();
    }
}
