//! Sync log model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Status of a sync log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Error,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl From<&str> for LogStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "success" => Self::Success,
            _ => Self::Error,
        }
    }
}

/// Log of recent sync passes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SyncLog {
    pub id: i64,

    /// Operation: `sync_tenant`, `sync_product`, `sync_complete`.
    pub operation: String,

    /// Status: `success`, `error`.
    pub status: String,

    pub tenant_id: Option<i64>,

    /// Details or error message.
    pub message: Option<String>,

    pub duration_ms: Option<i64>,

    /// When the operation finished (Unix).
    pub timestamp: i64,
}

impl SyncLog {
    /// Maximum number of log entries to keep.
    pub const MAX_ENTRIES: i64 = 50;

    pub fn status_enum(&self) -> LogStatus {
        LogStatus::from(self.status.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.status_enum() == LogStatus::Error
    }
}
