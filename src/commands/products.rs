//! Product and mirrored-entity read commands.

use crate::db::pool::DbPool;
use crate::error::AppError;
use crate::models::{NewProduct, Product, PullRequest, Repository, VulnerabilityAlert};
use crate::services::catalog;
use tauri::State;

/// List products, optionally only those of one tenant.
#[tauri::command]
pub async fn list_products(
    pool: State<'_, DbPool>,
    tenant_id: Option<i64>,
) -> Result<Vec<Product>, AppError> {
    match tenant_id {
        Some(tenant_id) => catalog::list_products_by_tenant(pool.inner(), tenant_id).await,
        None => catalog::list_products(pool.inner()).await,
    }
}

#[tauri::command]
pub async fn get_product(pool: State<'_, DbPool>, id: i64) -> Result<Product, AppError> {
    catalog::get_product(pool.inner(), id).await
}

#[tauri::command]
pub async fn create_product(
    pool: State<'_, DbPool>,
    input: NewProduct,
) -> Result<Product, AppError> {
    catalog::create_product(pool.inner(), input).await
}

#[tauri::command]
pub async fn update_product(
    pool: State<'_, DbPool>,
    id: i64,
    input: NewProduct,
) -> Result<Product, AppError> {
    catalog::update_product(pool.inner(), id, input).await
}

/// Delete a product together with the repositories mirrored under its tags.
#[tauri::command]
pub async fn delete_product(pool: State<'_, DbPool>, id: i64) -> Result<(), AppError> {
    catalog::delete_product(pool.inner(), id).await
}

#[tauri::command]
pub async fn list_product_repositories(
    pool: State<'_, DbPool>,
    product_id: i64,
) -> Result<Vec<Repository>, AppError> {
    catalog::list_repositories_for_product(pool.inner(), product_id).await
}

#[tauri::command]
pub async fn list_repository_pull_requests(
    pool: State<'_, DbPool>,
    repository_name: String,
) -> Result<Vec<PullRequest>, AppError> {
    catalog::list_pull_requests_for_repository(pool.inner(), &repository_name).await
}

#[tauri::command]
pub async fn list_repository_alerts(
    pool: State<'_, DbPool>,
    repository_name: String,
) -> Result<Vec<VulnerabilityAlert>, AppError> {
    catalog::list_alerts_for_repository(pool.inner(), &repository_name).await
}
