//! Database queries for notifications.

use super::pool::DbPool;
use crate::models::{Notification, NotificationStatus, NotificationType};
use sqlx::SqliteConnection;

const NOTIFICATION_COLUMNS: &str =
    "id, tenant_id, external_id, notification_type, content, status, created_at, updated_at";

/// Insert an unread notification unless one already exists for the
/// `(tenant_id, external_id, type)` triple. Returns the number of rows written.
pub async fn create_if_absent(
    conn: &mut SqliteConnection,
    tenant_id: i64,
    external_id: &str,
    notification_type: NotificationType,
    content: &str,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (tenant_id, external_id, notification_type, content, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'unread', ?, ?)
        ON CONFLICT (tenant_id, external_id, notification_type) DO NOTHING
        "#,
    )
    .bind(tenant_id)
    .bind(external_id)
    .bind(notification_type.as_str())
    .bind(content)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// List notifications, newest first, optionally filtered by tenant and status.
pub async fn list(
    pool: &DbPool,
    tenant_id: Option<i64>,
    status: Option<NotificationStatus>,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        r#"
        SELECT {} FROM notifications
        WHERE (?1 IS NULL OR tenant_id = ?1)
          AND (?2 IS NULL OR status = ?2)
        ORDER BY created_at DESC, id DESC
        "#,
        NOTIFICATION_COLUMNS
    ))
    .bind(tenant_id)
    .bind(status.map(|s| s.as_str()))
    .fetch_all(pool)
    .await
}

pub async fn unread_count(pool: &DbPool, tenant_id: Option<i64>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE status = 'unread' AND (?1 IS NULL OR tenant_id = ?1)",
    )
    .bind(tenant_id)
    .fetch_one(pool)
    .await
}

/// Set the status of one notification. Returns false if it does not exist.
pub async fn update_status(
    pool: &DbPool,
    id: i64,
    status: NotificationStatus,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE notifications SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Mark every unread notification of a tenant as read.
pub async fn mark_all_read(pool: &DbPool, tenant_id: i64, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE notifications SET status = 'read', updated_at = ? WHERE tenant_id = ? AND status = 'unread'",
    )
    .bind(now)
    .bind(tenant_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Delete notifications created strictly before `cutoff`.
pub async fn delete_before(pool: &DbPool, cutoff: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM notifications WHERE created_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
