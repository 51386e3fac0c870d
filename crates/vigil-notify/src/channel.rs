//! Notification delivery channels.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::types::{NotificationLevel, NotificationRequest};

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResult {
    /// Whether delivery was accepted by the channel.
    pub success: bool,
    /// The channel that processed the request.
    pub channel: String,
    /// Optional message or error description.
    pub message: Option<String>,
}

impl NotificationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
        }
    }
}

/// A transport capable of delivering notification requests.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// The channel name, used in results and logs.
    fn name(&self) -> &str;

    /// Delivers one request.
    async fn send(&self, request: &NotificationRequest) -> NotificationResult;
}

/// Channel that emits requests as structured log lines.
#[derive(Debug, Clone, Default)]
pub struct TracingNotificationChannel;

impl TracingNotificationChannel {
    /// Creates a new tracing channel.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationChannel for TracingNotificationChannel {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn send(&self, request: &NotificationRequest) -> NotificationResult {
        info!(
            target: "vigil_notify",
            level = %request.level,
            title = %request.title,
            correlation_id = %request.correlation_id,
            audience = ?request.audience_tags,
            "{}",
            request.body
        );
        NotificationResult::success("tracing")
    }
}

/// In-memory channel recording everything it receives. Intended for tests.
#[derive(Debug, Default)]
pub struct MemoryNotificationChannel {
    sent: Mutex<Vec<NotificationRequest>>,
}

impl MemoryNotificationChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded request.
    #[must_use]
    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().clone()
    }

    /// Returns the number of recorded requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    /// Returns true when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    /// Returns true if any recorded request has the given title.
    #[must_use]
    pub fn contains_title(&self, title: &str) -> bool {
        self.sent.lock().iter().any(|r| r.title == title)
    }
}

#[async_trait]
impl NotificationChannel for MemoryNotificationChannel {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, request: &NotificationRequest) -> NotificationResult {
        self.sent.lock().push(request.clone());
        NotificationResult::success("memory")
    }
}

/// Fans a request out to every configured channel with a per-send timeout.
///
/// Delivery failure is reported in the results and logged; it is never an
/// error, so a broken transport cannot stall a rollback.
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    send_timeout: Duration,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field(
                "channels",
                &self.channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

impl NotificationDispatcher {
    /// Creates a dispatcher with a 10 second per-send timeout.
    #[must_use]
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            send_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the per-send timeout.
    #[must_use]
    pub const fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Sends the request through every channel.
    pub async fn dispatch(&self, request: &NotificationRequest) -> Vec<NotificationResult> {
        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let result = match tokio::time::timeout(self.send_timeout, channel.send(request)).await
            {
                Ok(result) => result,
                Err(_) => NotificationResult::failure(channel.name(), "send timeout"),
            };

            if !result.success {
                warn!(
                    channel = %result.channel,
                    title = %request.title,
                    message = result.message.as_deref().unwrap_or(""),
                    "notification delivery failed"
                );
            }
            results.push(result);
        }

        results
    }
}
