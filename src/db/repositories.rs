//! Database queries for mirrored repositories.

use super::pool::DbPool;
use crate::models::{NewRepository, Repository};

const REPOSITORY_COLUMNS: &str = "id, name, url, topic, owner, created_at, updated_at";

/// Insert a repository. Fails with a unique violation if `name` exists.
pub async fn create(
    pool: &DbPool,
    repo: &NewRepository,
    now: i64,
) -> Result<Repository, sqlx::Error> {
    sqlx::query_as::<_, Repository>(&format!(
        r#"
        INSERT INTO repositories (name, url, topic, owner, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        REPOSITORY_COLUMNS
    ))
    .bind(&repo.name)
    .bind(&repo.url)
    .bind(&repo.topic)
    .bind(&repo.owner)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

/// Overwrite `url`, `topic` and `owner` of an existing row.
pub async fn update(
    pool: &DbPool,
    id: i64,
    repo: &NewRepository,
    now: i64,
) -> Result<Repository, sqlx::Error> {
    sqlx::query_as::<_, Repository>(&format!(
        r#"
        UPDATE repositories
        SET url = ?, topic = ?, owner = ?, updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        REPOSITORY_COLUMNS
    ))
    .bind(&repo.url)
    .bind(&repo.topic)
    .bind(&repo.owner)
    .bind(now)
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn get_by_name(pool: &DbPool, name: &str) -> Result<Option<Repository>, sqlx::Error> {
    sqlx::query_as::<_, Repository>(&format!(
        "SELECT {} FROM repositories WHERE name = ?",
        REPOSITORY_COLUMNS
    ))
    .bind(name)
    .fetch_optional(pool)
    .await
}

/// Repositories whose topic is one of the product's tags.
pub async fn list_by_product_tag(
    pool: &DbPool,
    product_id: i64,
) -> Result<Vec<Repository>, sqlx::Error> {
    sqlx::query_as::<_, Repository>(
        r#"
        SELECT r.id, r.name, r.url, r.topic, r.owner, r.created_at, r.updated_at
        FROM repositories r
        WHERE r.topic IN (
            SELECT value FROM json_each((SELECT tags FROM products WHERE id = ?))
        )
        ORDER BY r.name
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await
}

/// Delete every repository discovered under one of the product's tags.
pub async fn delete_by_product(pool: &DbPool, product_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM repositories
        WHERE topic IN (
            SELECT value FROM json_each((SELECT tags FROM products WHERE id = ?))
        )
        "#,
    )
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
