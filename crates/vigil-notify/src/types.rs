//! Notification request types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Urgency level of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Informational update.
    Info,
    /// Something needs attention soon.
    Warning,
    /// Something needs attention now.
    Critical,
}

impl NotificationLevel {
    /// Returns the level as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured notification to be delivered by a transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Urgency level.
    pub level: NotificationLevel,
    /// Short headline.
    pub title: String,
    /// Full message body.
    pub body: String,
    /// Audience routing tags (e.g. `oncall`, `finance-leadership`).
    pub audience_tags: Vec<String>,
    /// Correlates the notification with the originating record
    /// (execution id, decision id).
    pub correlation_id: String,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
}

impl NotificationRequest {
    /// Creates a request with a generated correlation id.
    #[must_use]
    pub fn new(
        level: NotificationLevel,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
            audience_tags: Vec::new(),
            correlation_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    /// Adds an audience tag.
    #[must_use]
    pub fn with_audience(mut self, tag: impl Into<String>) -> Self {
        self.audience_tags.push(tag.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let request = NotificationRequest::new(
            NotificationLevel::Critical,
            "Rollback started",
            "Execution exec-1 started for deploy-7",
        )
        .with_correlation_id("exec-1")
        .with_audience("oncall")
        .with_audience("finance-leadership");

        assert_eq!(request.level, NotificationLevel::Critical);
        assert_eq!(request.correlation_id, "exec-1");
        assert_eq!(request.audience_tags.len(), 2);
    }

    #[test]
    fn levels_order_by_urgency() {
        assert!(NotificationLevel::Info < NotificationLevel::Warning);
        assert!(NotificationLevel::Warning < NotificationLevel::Critical);
    }
}
