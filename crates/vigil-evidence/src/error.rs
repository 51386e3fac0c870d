//! Error types for the evidence log.

use thiserror::Error;

/// Errors that can occur in evidence operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvidenceError {
    /// The sink rejected or could not accept a write.
    #[error("Evidence sink unavailable: {reason}")]
    SinkUnavailable {
        /// Why the sink could not accept the write.
        reason: String,
    },

    /// The requested stream does not exist.
    #[error("Evidence stream not found: {stream_id}")]
    StreamNotFound {
        /// The stream that was requested.
        stream_id: String,
    },
}

/// Result type for evidence operations.
pub type Result<T> = std::result::Result<T, EvidenceError>;
