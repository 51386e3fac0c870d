//! Notification requests and delivery channels for the Vigil platform.
//!
//! The core emits structured [`NotificationRequest`] records on rollback
//! start, completion, and failure; transport is a collaborator concern.
//! This crate provides the request type, the [`NotificationChannel`]
//! contract, and tracing/in-memory channels:
//!
//! - [`TracingNotificationChannel`]: emits requests as structured log
//!   lines (the default for headless deployments)
//! - [`MemoryNotificationChannel`]: records requests for tests
//! - [`NotificationDispatcher`]: fan-out over channels with a per-send
//!   timeout; delivery failure is reported, never raised

pub mod channel;
pub mod types;

pub use channel::{
    MemoryNotificationChannel, NotificationChannel, NotificationDispatcher, NotificationResult,
    TracingNotificationChannel,
};
pub use types::{NotificationLevel, NotificationRequest};
