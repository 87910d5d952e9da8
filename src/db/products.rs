//! Database queries for products and their tenant links.

use super::pool::DbPool;
use crate::models::Product;
use sqlx::SqliteConnection;

const PRODUCT_COLUMNS: &str = "id, name, description, tags, created_at, updated_at";

/// Insert a product. `tags` is the already-encoded JSON array.
pub async fn create(
    conn: &mut SqliteConnection,
    name: &str,
    description: Option<&str>,
    tags: &str,
    now: i64,
) -> Result<Product, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        r#"
        INSERT INTO products (name, description, tags, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(name)
    .bind(description)
    .bind(tags)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    name: &str,
    description: Option<&str>,
    tags: &str,
    now: i64,
) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        r#"
        UPDATE products
        SET name = ?, description = ?, tags = ?, updated_at = ?
        WHERE id = ?
        RETURNING {}
        "#,
        PRODUCT_COLUMNS
    ))
    .bind(name)
    .bind(description)
    .bind(tags)
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// The stored tags of a product; `None` if the product does not exist.
pub async fn get_tags(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Option<String>>, sqlx::Error> {
    sqlx::query_scalar("SELECT tags FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn get(pool: &DbPool, id: i64) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products WHERE id = ?",
        PRODUCT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list(pool: &DbPool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products ORDER BY name, id",
        PRODUCT_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

/// Products linked to a tenant, oldest first.
pub async fn list_by_tenant(pool: &DbPool, tenant_id: i64) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT p.id, p.name, p.description, p.tags, p.created_at, p.updated_at
        FROM products p
        JOIN product_tenant_links l ON l.product_id = p.id
        WHERE l.tenant_id = ?
        ORDER BY p.id
        "#,
    )
    .bind(tenant_id)
    .fetch_all(pool)
    .await
}

pub async fn link_tenant(
    conn: &mut SqliteConnection,
    product_id: i64,
    tenant_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT OR IGNORE INTO product_tenant_links (product_id, tenant_id) VALUES (?, ?)",
    )
    .bind(product_id)
    .bind(tenant_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Remove every tenant link of a product.
pub async fn unlink_tenants(
    conn: &mut SqliteConnection,
    product_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM product_tenant_links WHERE product_id = ?")
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Tenant ids linked to a product, lowest first.
pub async fn linked_tenant_ids(
    conn: &mut SqliteConnection,
    product_id: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT tenant_id FROM product_tenant_links WHERE product_id = ? ORDER BY tenant_id",
    )
    .bind(product_id)
    .fetch_all(conn)
    .await
}

/// Highest link id so far, or 0 when there are no links.
pub async fn max_link_id(pool: &DbPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) FROM product_tenant_links")
        .fetch_one(pool)
        .await
}

/// Move the notification checkpoint of links up to `up_to_link_id`.
///
/// Links created later keep their empty checkpoint.
pub async fn advance_link_checkpoints(
    conn: &mut SqliteConnection,
    up_to_link_id: i64,
    revision: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE product_tenant_links
        SET notified_revision = MAX(COALESCE(notified_revision, 0), ?)
        WHERE id <= ?
        "#,
    )
    .bind(revision)
    .bind(up_to_link_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Stamp a product as freshly synced.
pub async fn update_sync_date(pool: &DbPool, id: i64, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete the product row (links go with it). Returns false if nothing was deleted.
pub async fn delete(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
