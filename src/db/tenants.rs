//! Database queries for tenants.
//!
//! Functions that take a `&mut SqliteConnection` are meant to run inside a
//! caller-owned transaction (`&mut *tx`).

use super::pool::DbPool;
use crate::models::{Credential, Tenant, TenantView};
use sqlx::SqliteConnection;

const TENANT_COLUMNS: &str =
    "id, friendly_name, namespace, description, is_default, created_at, updated_at";

/// Insert a tenant row and return it.
pub async fn create(
    conn: &mut SqliteConnection,
    friendly_name: &str,
    namespace: &str,
    credential: &Credential,
    description: Option<&str>,
    is_default: bool,
    now: i64,
) -> Result<Tenant, sqlx::Error> {
    sqlx::query_as::<_, Tenant>(&format!(
        r#"
        INSERT INTO tenants (friendly_name, namespace, credential, description, is_default, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        TENANT_COLUMNS
    ))
    .bind(friendly_name)
    .bind(namespace)
    .bind(credential.expose())
    .bind(description)
    .bind(is_default)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await
}

/// Update a tenant's descriptive fields. A `None` credential is left unchanged.
///
/// `updated_at` is deliberately not touched: it is the staleness clock.
pub async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    friendly_name: &str,
    namespace: &str,
    credential: Option<&Credential>,
    description: Option<&str>,
) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>(&format!(
        r#"
        UPDATE tenants
        SET friendly_name = ?,
            namespace = ?,
            credential = COALESCE(?, credential),
            description = ?
        WHERE id = ?
        RETURNING {}
        "#,
        TENANT_COLUMNS
    ))
    .bind(friendly_name)
    .bind(namespace)
    .bind(credential.map(Credential::expose))
    .bind(description)
    .bind(id)
    .fetch_optional(conn)
    .await
}

pub async fn get(pool: &DbPool, id: i64) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>(&format!("SELECT {} FROM tenants WHERE id = ?", TENANT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &DbPool) -> Result<Vec<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {} FROM tenants ORDER BY friendly_name, id",
        TENANT_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn get_default(pool: &DbPool) -> Result<Option<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {} FROM tenants WHERE is_default = 1 LIMIT 1",
        TENANT_COLUMNS
    ))
    .fetch_optional(pool)
    .await
}

/// Clear the default flag on every tenant.
pub async fn set_default_false(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tenants SET is_default = 0 WHERE is_default = 1")
        .execute(conn)
        .await?;
    Ok(())
}

/// Set the default flag on one tenant. Returns false if the tenant does not exist.
pub async fn set_default(conn: &mut SqliteConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE tenants SET is_default = 1 WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Clear the default flag on one tenant.
pub async fn unset_default(conn: &mut SqliteConnection, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tenants SET is_default = 0 WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Tenants whose last sync stamp is strictly older than `updated_before`.
pub async fn list_stale(pool: &DbPool, updated_before: i64) -> Result<Vec<Tenant>, sqlx::Error> {
    sqlx::query_as::<_, Tenant>(&format!(
        "SELECT {} FROM tenants WHERE updated_at < ? ORDER BY updated_at, id",
        TENANT_COLUMNS
    ))
    .bind(updated_before)
    .fetch_all(pool)
    .await
}

/// Every tenant linked to a product, with credentials, lowest id first.
pub async fn list_for_product(
    pool: &DbPool,
    product_id: i64,
) -> Result<Vec<TenantView>, sqlx::Error> {
    sqlx::query_as::<_, TenantView>(
        r#"
        SELECT t.id, t.friendly_name, t.namespace, t.credential
        FROM tenants t
        JOIN product_tenant_links l ON l.tenant_id = t.id
        WHERE l.product_id = ?
        ORDER BY t.id
        "#,
    )
    .bind(product_id)
    .fetch_all(pool)
    .await
}

/// Stamp a tenant as freshly synced.
pub async fn update_sync_date(pool: &DbPool, id: i64, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE tenants SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_product_links(
    conn: &mut SqliteConnection,
    tenant_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM product_tenant_links WHERE tenant_id = ?")
        .bind(tenant_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Delete the tenant row. Returns false if nothing was deleted.
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tenants WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_tenant, test_pool};

    #[tokio::test]
    async fn test_create_and_get() {
        let (pool, _dir) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let tenant = create(
            &mut conn,
            "Acme",
            "acme",
            &Credential::new("tok"),
            Some("main org"),
            false,
            100,
        )
        .await
        .unwrap();
        drop(conn);

        let fetched = get(&pool, tenant.id).await.unwrap().unwrap();
        assert_eq!(fetched.namespace, "acme");
        assert_eq!(fetched.description.as_deref(), Some("main org"));
        assert_eq!(fetched.updated_at, 100);
        assert!(get(&pool, 9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_stale_is_strict() {
        let (pool, _dir) = test_pool().await;
        insert_tenant(&pool, "old", 100).await;
        insert_tenant(&pool, "edge", 200).await;
        insert_tenant(&pool, "fresh", 300).await;

        let stale = list_stale(&pool, 200).await.unwrap();
        let namespaces: Vec<&str> = stale.iter().map(|t| t.namespace.as_str()).collect();
        assert_eq!(namespaces, vec!["old"]);
    }

    #[tokio::test]
    async fn test_update_keeps_credential_when_absent() {
        let (pool, _dir) = test_pool().await;
        let id = insert_tenant(&pool, "acme", 100).await;
        let mut conn = pool.acquire().await.unwrap();

        let updated = update(&mut conn, id, "Acme Corp", "acme", None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.friendly_name, "Acme Corp");
        assert_eq!(updated.updated_at, 100);

        let credential: String = sqlx::query_scalar("SELECT credential FROM tenants WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(credential, "secret");
    }

    #[tokio::test]
    async fn test_list_for_product_includes_credential() {
        let (pool, _dir) = test_pool().await;
        let tenant_id = insert_tenant(&pool, "acme", 100).await;
        let product_id: i64 =
            sqlx::query_scalar("INSERT INTO products (name) VALUES ('p') RETURNING id")
                .fetch_one(&pool)
                .await
                .unwrap();
        sqlx::query("INSERT INTO product_tenant_links (product_id, tenant_id) VALUES (?, ?)")
            .bind(product_id)
            .bind(tenant_id)
            .execute(&pool)
            .await
            .unwrap();

        let views = list_for_product(&pool, product_id).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id, tenant_id);
        assert_eq!(views[0].credential.expose(), "secret");
        assert!(list_for_product(&pool, product_id + 1).await.unwrap().is_empty());
    }
}
