//! Notification model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// What a notification announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    OpenPullRequest,
    OpenSecurityAlert,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenPullRequest => "OPEN_PULL_REQUEST",
            Self::OpenSecurityAlert => "OPEN_SECURITY_ALERT",
        }
    }

    /// Display text for a notification about `repository_name`.
    pub fn content_for(&self, repository_name: &str) -> String {
        match self {
            Self::OpenPullRequest => format!("{}: New pull request", repository_name),
            Self::OpenSecurityAlert => format!("{}: New security alert", repository_name),
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read status of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Unread,
    Read,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
        }
    }
}

impl From<&str> for NotificationStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "read" => Self::Read,
            _ => Self::Unread,
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted notification.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub tenant_id: i64,

    /// External ID of the pull request or alert that triggered it.
    pub external_id: String,

    /// `OPEN_PULL_REQUEST` or `OPEN_SECURITY_ALERT`.
    pub notification_type: String,

    pub content: String,

    /// `unread` or `read`.
    pub status: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Notification {
    pub fn status_enum(&self) -> NotificationStatus {
        NotificationStatus::from(self.status.as_str())
    }

    pub fn is_unread(&self) -> bool {
        self.status_enum() == NotificationStatus::Unread
    }
}

/// A row that has not been announced to its tenant yet.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PendingNotification {
    pub external_id: String,
    pub repository_name: String,
    pub tenant_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_for() {
        assert_eq!(
            NotificationType::OpenPullRequest.content_for("api"),
            "api: New pull request"
        );
        assert_eq!(
            NotificationType::OpenSecurityAlert.content_for("api"),
            "api: New security alert"
        );
    }

    #[test]
    fn test_serialized_names_match_stored_strings() {
        for kind in [
            NotificationType::OpenPullRequest,
            NotificationType::OpenSecurityAlert,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(NotificationStatus::from("READ"), NotificationStatus::Read);
        assert_eq!(NotificationStatus::Unread.to_string(), "unread");
    }
}
