//! Database queries for vulnerability alerts.

use super::pool::DbPool;
use crate::models::{NewVulnerabilityAlert, PendingNotification, VulnerabilityAlert};
use sqlx::SqliteConnection;

const ALERT_COLUMNS: &str = "id, external_id, repository_name, package_name, state, severity, patched_version, fixed_at, remote_created_at, created_at, updated_at";

/// Insert an alert. Fails with a unique violation if `external_id` exists.
pub async fn create(
    conn: &mut SqliteConnection,
    alert: &NewVulnerabilityAlert,
    revision: i64,
    now: i64,
) -> Result<VulnerabilityAlert, sqlx::Error> {
    sqlx::query_as::<_, VulnerabilityAlert>(&format!(
        r#"
        INSERT INTO vulnerability_alerts (
            external_id, repository_name, package_name, state, severity,
            patched_version, fixed_at, remote_created_at, revision, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        ALERT_COLUMNS
    ))
    .bind(&alert.external_id)
    .bind(&alert.repository_name)
    .bind(&alert.package_name)
    .bind(alert.state.to_string())
    .bind(alert.severity.to_string())
    .bind(&alert.patched_version)
    .bind(alert.fixed_at)
    .bind(alert.remote_created_at)
    .bind(revision)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
}

/// Overwrite `package_name`, `state`, `severity`, `patched_version` and `fixed_at`.
///
/// `revision` is only stored when the state changes.
pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    alert: &NewVulnerabilityAlert,
    revision: i64,
    now: i64,
) -> Result<VulnerabilityAlert, sqlx::Error> {
    sqlx::query_as::<_, VulnerabilityAlert>(&format!(
        r#"
        UPDATE vulnerability_alerts
        SET package_name = ?,
            state = ?,
            severity = ?,
            patched_version = ?,
            fixed_at = ?,
            revision = CASE WHEN state = ? THEN revision ELSE ? END,
            updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        ALERT_COLUMNS
    ))
    .bind(&alert.package_name)
    .bind(alert.state.to_string())
    .bind(alert.severity.to_string())
    .bind(&alert.patched_version)
    .bind(alert.fixed_at)
    .bind(alert.state.to_string())
    .bind(revision)
    .bind(now)
    .bind(id)
    .fetch_one(conn)
    .await
}

pub async fn get_by_external_id(
    conn: &mut SqliteConnection,
    external_id: &str,
) -> Result<Option<VulnerabilityAlert>, sqlx::Error> {
    sqlx::query_as::<_, VulnerabilityAlert>(&format!(
        "SELECT {} FROM vulnerability_alerts WHERE external_id = ?",
        ALERT_COLUMNS
    ))
    .bind(external_id)
    .fetch_optional(conn)
    .await
}

pub async fn list_by_repository(
    pool: &DbPool,
    repository_name: &str,
) -> Result<Vec<VulnerabilityAlert>, sqlx::Error> {
    sqlx::query_as::<_, VulnerabilityAlert>(&format!(
        "SELECT {} FROM vulnerability_alerts WHERE repository_name = ? ORDER BY remote_created_at, id",
        ALERT_COLUMNS
    ))
    .bind(repository_name)
    .fetch_all(pool)
    .await
}

/// Delete alerts of every repository under the product's tags.
pub async fn delete_by_product(pool: &DbPool, product_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM vulnerability_alerts
        WHERE repository_name IN (
            SELECT name FROM repositories
            WHERE topic IN (
                SELECT value FROM json_each((SELECT tags FROM products WHERE id = ?))
            )
        )
        "#,
    )
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Open alerts that a tenant has not been notified about yet.
///
/// Same ownership and checkpoint rules as [`super::pull_requests::recent`].
pub async fn recent(
    pool: &DbPool,
    up_to_revision: i64,
) -> Result<Vec<PendingNotification>, sqlx::Error> {
    sqlx::query_as::<_, PendingNotification>(
        r#"
        SELECT DISTINCT a.external_id, a.repository_name, t.id AS tenant_id
        FROM vulnerability_alerts a
        JOIN repositories r ON r.name = a.repository_name
        JOIN products p
            ON EXISTS (SELECT 1 FROM json_each(p.tags) j WHERE j.value = r.topic)
        JOIN product_tenant_links l ON l.product_id = p.id
        JOIN tenants t ON t.id = l.tenant_id
        LEFT JOIN notifications n
            ON n.external_id = a.external_id
            AND n.tenant_id = t.id
            AND n.notification_type = 'OPEN_SECURITY_ALERT'
        WHERE n.id IS NULL
          AND a.state = 'OPEN'
          AND a.revision <= ?
          AND a.revision > COALESCE(l.notified_revision, 0)
        ORDER BY t.id, a.external_id
        "#,
    )
    .bind(up_to_revision)
    .fetch_all(pool)
    .await
}
