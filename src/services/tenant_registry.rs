//! Tenant registry.
//!
//! Tenant CRUD on top of the store gateway. Every write that touches the
//! default flag clears it on all tenants and sets it on the target inside
//! one transaction, so at most one tenant is ever the default.

use crate::db::{self, pool::DbPool, tenants};
use crate::error::AppError;
use crate::models::{NewTenant, Tenant, TenantView, UpdateTenant};

fn validate(friendly_name: &str, namespace: &str) -> Result<(), AppError> {
    if friendly_name.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            "Friendly name must not be empty",
            "friendlyName",
        ));
    }
    if namespace.is_empty() {
        return Err(AppError::invalid_input_field(
            "Namespace must not be empty",
            "namespace",
        ));
    }
    Ok(())
}

fn map_write_error(err: sqlx::Error, namespace: &str) -> AppError {
    if db::is_unique_violation(&err) {
        AppError::invalid_input_field(
            format!("A tenant with namespace '{}' already exists", namespace),
            "namespace",
        )
    } else {
        AppError::database_with_op(err.to_string(), "write tenant")
    }
}

/// Create a tenant, making it the default if requested.
pub async fn create_tenant(pool: &DbPool, input: NewTenant) -> Result<Tenant, AppError> {
    let namespace = NewTenant::normalize_namespace(&input.namespace);
    validate(&input.friendly_name, &namespace)?;
    if input.credential.is_empty() {
        return Err(AppError::invalid_input_field(
            "Credential must not be empty",
            "credential",
        ));
    }

    let mut tx = pool.begin().await?;
    if input.is_default {
        tenants::set_default_false(&mut tx).await?;
    }
    let tenant = tenants::create(
        &mut tx,
        input.friendly_name.trim(),
        &namespace,
        &input.credential,
        input.description.as_deref(),
        input.is_default,
        db::now(),
    )
    .await
    .map_err(|e| map_write_error(e, &namespace))?;
    tx.commit().await?;

    log::info!("Created tenant {} ({})", tenant.id, tenant.namespace);
    Ok(tenant)
}

/// Update a tenant. `is_default: Some(true)` moves the default flag to it.
pub async fn update_tenant(
    pool: &DbPool,
    id: i64,
    input: UpdateTenant,
) -> Result<Tenant, AppError> {
    let namespace = NewTenant::normalize_namespace(&input.namespace);
    validate(&input.friendly_name, &namespace)?;
    let credential = input.credential.filter(|c| !c.is_empty());

    let mut tx = pool.begin().await?;
    let mut tenant = tenants::update(
        &mut tx,
        id,
        input.friendly_name.trim(),
        &namespace,
        credential.as_ref(),
        input.description.as_deref(),
    )
    .await
    .map_err(|e| map_write_error(e, &namespace))?
    .ok_or_else(|| AppError::not_found_with_id("Tenant", id))?;

    match input.is_default {
        Some(true) => {
            tenants::set_default_false(&mut tx).await?;
            tenants::set_default(&mut tx, id).await?;
            tenant.is_default = true;
        }
        Some(false) => {
            tenants::unset_default(&mut tx, id).await?;
            tenant.is_default = false;
        }
        None => {}
    }
    tx.commit().await?;

    Ok(tenant)
}

pub async fn get_tenant(pool: &DbPool, id: i64) -> Result<Tenant, AppError> {
    tenants::get(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("Tenant", id))
}

pub async fn list_tenants(pool: &DbPool) -> Result<Vec<Tenant>, AppError> {
    Ok(tenants::list(pool).await?)
}

pub async fn get_default_tenant(pool: &DbPool) -> Result<Option<Tenant>, AppError> {
    Ok(tenants::get_default(pool).await?)
}

/// Make `id` the only default tenant.
pub async fn set_default_tenant(pool: &DbPool, id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    tenants::set_default_false(&mut tx).await?;
    if !tenants::set_default(&mut tx, id).await? {
        // Dropping the transaction rolls back the cleared flags
        return Err(AppError::not_found_with_id("Tenant", id));
    }
    tx.commit().await?;
    Ok(())
}

/// Delete a tenant and its product links in one transaction.
pub async fn delete_tenant(pool: &DbPool, id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    tenants::delete_product_links(&mut tx, id).await?;
    if !tenants::delete(&mut tx, id).await? {
        return Err(AppError::not_found_with_id("Tenant", id));
    }
    tx.commit().await?;

    log::info!("Deleted tenant {}", id);
    Ok(())
}

/// Tenants not synced within the last `staleness_secs`.
pub async fn list_stale(pool: &DbPool, staleness_secs: u64) -> Result<Vec<Tenant>, AppError> {
    let updated_before = db::seconds_before_now(staleness_secs).ok_or_else(|| {
        AppError::invalid_input_field(
            format!("Staleness of {}s is out of range", staleness_secs),
            "stalenessSecs",
        )
    })?;
    Ok(tenants::list_stale(pool, updated_before).await?)
}

/// The tenant owning a product, with its credential.
///
/// A product linked to several tenants has no single owner and is refused.
pub async fn resolve_for_product(pool: &DbPool, product_id: i64) -> Result<TenantView, AppError> {
    let mut owners = tenants::list_for_product(pool, product_id).await?;
    match owners.len() {
        0 => Err(AppError::not_found_with_id("Tenant for product", product_id)),
        1 => Ok(owners.remove(0)),
        n => Err(AppError::Sync {
            message: format!("Product {} is linked to {} tenants", product_id, n),
            tenant_id: None,
        }),
    }
}

/// Stamp a tenant as freshly synced.
pub async fn mark_synced(pool: &DbPool, id: i64) -> Result<(), AppError> {
    tenants::update_sync_date(pool, id, db::now()).await?;
    Ok(())
}
