//! Database queries for the bounded sync log.

use super::pool::DbPool;
use crate::models::{LogStatus, SyncLog};

/// Append a log entry and prune old ones, keeping the newest
/// [`SyncLog::MAX_ENTRIES`].
pub async fn insert(
    pool: &DbPool,
    operation: &str,
    status: LogStatus,
    tenant_id: Option<i64>,
    message: Option<&str>,
    duration_ms: Option<i64>,
    timestamp: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sync_log (operation, status, tenant_id, message, duration_ms, timestamp)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(operation)
    .bind(status.as_str())
    .bind(tenant_id)
    .bind(message)
    .bind(duration_ms)
    .bind(timestamp)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        DELETE FROM sync_log
        WHERE id NOT IN (
            SELECT id FROM sync_log ORDER BY id DESC LIMIT ?
        )
        "#,
    )
    .bind(SyncLog::MAX_ENTRIES)
    .execute(pool)
    .await?;

    Ok(())
}

/// Newest entries first.
pub async fn list(pool: &DbPool, limit: i64) -> Result<Vec<SyncLog>, sqlx::Error> {
    sqlx::query_as::<_, SyncLog>(
        r#"
        SELECT id, operation, status, tenant_id, message, duration_ms, timestamp
        FROM sync_log
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    #[tokio::test]
    async fn test_log_is_capped() {
        let (pool, _dir) = test_pool().await;
        for i in 0..(SyncLog::MAX_ENTRIES + 5) {
            insert(&pool, "sync_tenant", LogStatus::Success, Some(1), None, Some(i), i)
                .await
                .unwrap();
        }

        let entries = list(&pool, 100).await.unwrap();
        assert_eq!(entries.len() as i64, SyncLog::MAX_ENTRIES);
        assert_eq!(entries[0].timestamp, SyncLog::MAX_ENTRIES + 4);
    }

    #[tokio::test]
    async fn test_error_entries() {
        let (pool, _dir) = test_pool().await;
        insert(&pool, "sync_tenant", LogStatus::Error, Some(2), Some("boom"), None, 5)
            .await
            .unwrap();

        let entries = list(&pool, 10).await.unwrap();
        assert!(entries[0].is_error());
        assert_eq!(entries[0].message.as_deref(), Some("boom"));
    }
}
