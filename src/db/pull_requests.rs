//! Database queries for mirrored pull requests.

use super::pool::DbPool;
use crate::models::{NewPullRequest, PendingNotification, PullRequest};
use sqlx::SqliteConnection;

const PULL_REQUEST_COLUMNS: &str = "id, external_id, title, repository_name, url, state, author, merged_at, remote_created_at, created_at, updated_at";

/// Insert a pull request. Fails with a unique violation if `external_id` exists.
pub async fn create(
    conn: &mut SqliteConnection,
    pr: &NewPullRequest,
    revision: i64,
    now: i64,
) -> Result<PullRequest, sqlx::Error> {
    sqlx::query_as::<_, PullRequest>(&format!(
        r#"
        INSERT INTO pull_requests (
            external_id, title, repository_name, url, state, author,
            merged_at, remote_created_at, revision, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        PULL_REQUEST_COLUMNS
    ))
    .bind(&pr.external_id)
    .bind(&pr.title)
    .bind(&pr.repository_name)
    .bind(&pr.url)
    .bind(pr.state.to_string())
    .bind(&pr.author)
    .bind(pr.merged_at)
    .bind(pr.remote_created_at)
    .bind(revision)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
}

/// Overwrite the remote-owned fields of an existing row.
///
/// `revision` is only stored when the state changes.
pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    pr: &NewPullRequest,
    revision: i64,
    now: i64,
) -> Result<PullRequest, sqlx::Error> {
    sqlx::query_as::<_, PullRequest>(&format!(
        r#"
        UPDATE pull_requests
        SET title = ?,
            repository_name = ?,
            url = ?,
            state = ?,
            author = ?,
            merged_at = ?,
            revision = CASE WHEN state = ? THEN revision ELSE ? END,
            updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        PULL_REQUEST_COLUMNS
    ))
    .bind(&pr.title)
    .bind(&pr.repository_name)
    .bind(&pr.url)
    .bind(pr.state.to_string())
    .bind(&pr.author)
    .bind(pr.merged_at)
    .bind(pr.state.to_string())
    .bind(revision)
    .bind(now)
    .bind(id)
    .fetch_one(conn)
    .await
}

pub async fn get_by_external_id(
    conn: &mut SqliteConnection,
    external_id: &str,
) -> Result<Option<PullRequest>, sqlx::Error> {
    sqlx::query_as::<_, PullRequest>(&format!(
        "SELECT {} FROM pull_requests WHERE external_id = ?",
        PULL_REQUEST_COLUMNS
    ))
    .bind(external_id)
    .fetch_optional(conn)
    .await
}

pub async fn list_by_repository(
    pool: &DbPool,
    repository_name: &str,
) -> Result<Vec<PullRequest>, sqlx::Error> {
    sqlx::query_as::<_, PullRequest>(&format!(
        "SELECT {} FROM pull_requests WHERE repository_name = ? ORDER BY remote_created_at, id",
        PULL_REQUEST_COLUMNS
    ))
    .bind(repository_name)
    .fetch_all(pool)
    .await
}

/// Delete pull requests of every repository under the product's tags.
pub async fn delete_by_product(pool: &DbPool, product_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM pull_requests
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

/// Open pull requests that a tenant has not been notified about yet.
///
/// A pull request belongs to a tenant when its repository's topic is a tag
/// of one of the tenant's products. Only rows whose revision lies in
/// `(link checkpoint, up_to_revision]` are considered: rows written since
/// the link's last pass, up to the caller's snapshot.
pub async fn recent(
    pool: &DbPool,
    up_to_revision: i64,
) -> Result<Vec<PendingNotification>, sqlx::Error> {
    sqlx::query_as::<_, PendingNotification>(
        r#"
        SELECT DISTINCT pr.external_id, pr.repository_name, t.id AS tenant_id
        FROM pull_requests pr
        JOIN repositories r ON r.name = pr.repository_name
        JOIN products p
            ON EXISTS (SELECT 1 FROM json_each(p.tags) j WHERE j.value = r.topic)
        JOIN product_tenant_links l ON l.product_id = p.id
        JOIN tenants t ON t.id = l.tenant_id
        LEFT JOIN notifications n
            ON n.external_id = pr.external_id
            AND n.tenant_id = t.id
            AND n.notification_type = 'OPEN_PULL_REQUEST'
        WHERE n.id IS NULL
          AND pr.state = 'OPEN'
          AND pr.revision <= ?
          AND pr.revision > COALESCE(l.notified_revision, 0)
        ORDER BY t.id, pr.external_id
        "#,
    )
    .bind(up_to_revision)
    .fetch_all(pool)
    .await
}
