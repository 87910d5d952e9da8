//! Mirrored pull request model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// State of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

impl From<&str> for PullRequestState {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MERGED" => Self::Merged,
            "CLOSED" => Self::Closed,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for PullRequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Merged => write!(f, "MERGED"),
        }
    }
}

/// A pull request row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Local ID.
    pub id: i64,

    /// Remote-assigned ID (unique).
    pub external_id: String,

    pub title: String,

    /// References `Repository.name`.
    pub repository_name: String,

    pub url: String,

    /// `OPEN`, `CLOSED` or `MERGED`.
    pub state: String,

    /// Author login.
    pub author: String,

    /// Merge timestamp (Unix, if merged).
    pub merged_at: Option<i64>,

    /// Creation timestamp reported by the remote (Unix).
    pub remote_created_at: Option<i64>,

    /// When the row was first stored locally (Unix).
    pub created_at: i64,

    /// When the row was last written locally (Unix).
    pub updated_at: i64,
}

impl PullRequest {
    /// Parse the state string into an enum.
    pub fn state_enum(&self) -> PullRequestState {
        PullRequestState::from(self.state.as_str())
    }

    pub fn is_open(&self) -> bool {
        self.state_enum() == PullRequestState::Open
    }
}

/// Fields written by a pull request upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub external_id: String,
    pub title: String,
    pub repository_name: String,
    pub url: String,
    pub state: PullRequestState,
    pub author: String,
    pub merged_at: Option<i64>,
    pub remote_created_at: Option<i64>,
}
