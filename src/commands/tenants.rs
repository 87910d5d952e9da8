//! Tenant management commands.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{NewTenant, Tenant, UpdateTenant};
use crate::services::tenant_registry;
use tauri::State;

#[tauri::command]
pub async fn list_tenants(pool: State<'_, DbPool>) -> Result<Vec<Tenant>, AppError> {
    tenant_registry::list_tenants(pool.inner()).await
}

#[tauri::command]
pub async fn get_tenant(pool: State<'_, DbPool>, id: i64) -> Result<Tenant, AppError> {
    tenant_registry::get_tenant(pool.inner(), id).await
}

/// Returns `None` when no tenant is the default.
#[tauri::command]
pub async fn get_default_tenant(pool: State<'_, DbPool>) -> Result<Option<Tenant>, AppError> {
    tenant_registry::get_default_tenant(pool.inner()).await
}

/// Create a tenant. The credential is stored but never returned.
#[tauri::command]
pub async fn create_tenant(
    pool: State<'_, DbPool>,
    input: NewTenant,
) -> Result<Tenant, AppError> {
    tenant_registry::create_tenant(pool.inner(), input).await
}

#[tauri::command]
pub async fn update_tenant(
    pool: State<'_, DbPool>,
    id: i64,
    input: UpdateTenant,
) -> Result<Tenant, AppError> {
    tenant_registry::update_tenant(pool.inner(), id, input).await
}

#[tauri::command]
pub async fn set_default_tenant(pool: State<'_, DbPool>, id: i64) -> Result<(), AppError> {
    tenant_registry::set_default_tenant(pool.inner(), id).await
}

#[tauri::command]
pub async fn delete_tenant(pool: State<'_, DbPool>, id: i64) -> Result<(), AppError> {
    tenant_registry::delete_tenant(pool.inner(), id).await
}
