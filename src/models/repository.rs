//! Mirrored repository model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A repository discovered under a product topic.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: i64,

    /// Repository name; the join key for pull requests and alerts.
    pub name: String,

    pub url: String,

    /// The tag the repository was discovered under.
    pub topic: String,

    /// Owner login.
    pub owner: String,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields written by a repository upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRepository {
    pub name: String,
    pub url: String,
    pub topic: String,
    pub owner: String,
}
