//! Product and repository catalog.
//!
//! Product CRUD plus the idempotent upserts used by the sync engine. An
//! upsert first attempts an insert; a unique-constraint conflict turns into
//! an update of the existing row and every other error propagates.

use crate::db::{self, pool::DbPool, products, pull_requests, repositories, vulnerability_alerts};
use crate::error::AppError;
use crate::models::product::normalize_tags;
use crate::models::{
    NewProduct, NewPullRequest, NewRepository, NewVulnerabilityAlert, Product, PullRequest,
    Repository, VulnerabilityAlert,
};

fn encode_tags(tags: &[String]) -> Result<String, AppError> {
    Ok(serde_json::to_string(&normalize_tags(tags))?)
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::invalid_input_field(
            "Product name must not be empty",
            "name",
        ));
    }
    Ok(())
}

/// Create a product and optionally link it to a tenant.
pub async fn create_product(pool: &DbPool, input: NewProduct) -> Result<Product, AppError> {
    validate_name(&input.name)?;
    let tags = encode_tags(&input.tags)?;

    let mut tx = pool.begin().await?;
    let product = products::create(
        &mut tx,
        input.name.trim(),
        input.description.as_deref(),
        &tags,
        db::now(),
    )
    .await?;
    if let Some(tenant_id) = input.tenant_id {
        products::link_tenant(&mut tx, product.id, tenant_id)
            .await
            .map_err(|e| {
                AppError::invalid_input_field(
                    format!("Cannot link tenant {}: {}", tenant_id, e),
                    "tenantId",
                )
            })?;
    }
    tx.commit().await?;

    Ok(product)
}

/// Replace a product's name, description and tags.
///
/// A tenant id moves the product to that tenant; `None` keeps the current
/// link. A product is never linked to more than one tenant. Changing the
/// tags or the tenant re-creates the link, so the new set of repositories
/// is announced from scratch by the next notifier pass.
pub async fn update_product(
    pool: &DbPool,
    id: i64,
    input: NewProduct,
) -> Result<Product, AppError> {
    validate_name(&input.name)?;
    let tags = encode_tags(&input.tags)?;

    let mut tx = pool.begin().await?;
    let previous_tags = products::get_tags(&mut tx, id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("Product", id))?;
    let product = products::update(
        &mut tx,
        id,
        input.name.trim(),
        input.description.as_deref(),
        &tags,
        db::now(),
    )
    .await?
    .ok_or_else(|| AppError::not_found_with_id("Product", id))?;

    let linked = products::linked_tenant_ids(&mut tx, id).await?;
    let wanted = match input.tenant_id {
        Some(tenant_id) => vec![tenant_id],
        None => linked.clone(),
    };
    if wanted != linked || previous_tags.as_deref() != Some(tags.as_str()) {
        products::unlink_tenants(&mut tx, id).await?;
        for tenant_id in wanted {
            products::link_tenant(&mut tx, id, tenant_id)
                .await
                .map_err(|e| {
                    AppError::invalid_input_field(
                        format!("Cannot link tenant {}: {}", tenant_id, e),
                        "tenantId",
                    )
                })?;
        }
    }
    tx.commit().await?;

    Ok(product)
}

pub async fn get_product(pool: &DbPool, id: i64) -> Result<Product, AppError> {
    products::get(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found_with_id("Product", id))
}

pub async fn list_products(pool: &DbPool) -> Result<Vec<Product>, AppError> {
    Ok(products::list(pool).await?)
}

pub async fn list_products_by_tenant(
    pool: &DbPool,
    tenant_id: i64,
) -> Result<Vec<Product>, AppError> {
    Ok(products::list_by_tenant(pool, tenant_id).await?)
}

/// Stamp a product as freshly synced.
pub async fn mark_product_synced(pool: &DbPool, id: i64) -> Result<(), AppError> {
    products::update_sync_date(pool, id, db::now()).await?;
    Ok(())
}

/// Delete a product and, best effort, everything mirrored under its tags.
///
/// Alerts, pull requests and repositories are removed in that order. A
/// failing step is logged and the next one still runs; only the error of
/// the final product-row delete is returned.
pub async fn delete_product(pool: &DbPool, id: i64) -> Result<(), AppError> {
    match vulnerability_alerts::delete_by_product(pool, id).await {
        Ok(n) => log::debug!("Deleted {} alerts of product {}", n, id),
        Err(e) => log::warn!("Failed to delete alerts of product {}: {}", id, e),
    }
    match pull_requests::delete_by_product(pool, id).await {
        Ok(n) => log::debug!("Deleted {} pull requests of product {}", n, id),
        Err(e) => log::warn!("Failed to delete pull requests of product {}: {}", id, e),
    }
    match repositories::delete_by_product(pool, id).await {
        Ok(n) => log::debug!("Deleted {} repositories of product {}", n, id),
        Err(e) => log::warn!("Failed to delete repositories of product {}: {}", id, e),
    }

    if !products::delete(pool, id).await? {
        return Err(AppError::not_found_with_id("Product", id));
    }
    Ok(())
}

/// Insert or update a repository keyed by `name`.
pub async fn upsert_repository(
    pool: &DbPool,
    repo: &NewRepository,
) -> Result<Repository, AppError> {
    let now = db::now();
    match repositories::create(pool, repo, now).await {
        Ok(created) => Ok(created),
        Err(e) if db::is_unique_violation(&e) => {
            let existing = repositories::get_by_name(pool, &repo.name)
                .await?
                .ok_or_else(|| AppError::not_found_with_id("Repository", &repo.name))?;
            Ok(repositories::update(pool, existing.id, repo, now).await?)
        }
        Err(e) => Err(AppError::database_with_op(e.to_string(), "upsert repository")),
    }
}

/// Insert or update a pull request keyed by `external_id`.
///
/// A new row, or a state change, takes a fresh change revision in the same
/// transaction. Re-syncing an unchanged row leaves its revision alone.
pub async fn upsert_pull_request(
    pool: &DbPool,
    pr: &NewPullRequest,
) -> Result<PullRequest, AppError> {
    let mut tx = pool.begin().await?;
    let revision = db::next_revision(&mut tx).await?;
    let now = db::now();
    let stored = match pull_requests::create(&mut tx, pr, revision, now).await {
        Ok(created) => created,
        Err(e) if db::is_unique_violation(&e) => {
            let existing = pull_requests::get_by_external_id(&mut tx, &pr.external_id)
                .await?
                .ok_or_else(|| AppError::not_found_with_id("Pull request", &pr.external_id))?;
            pull_requests::update(&mut tx, existing.id, pr, revision, now).await?
        }
        Err(e) => return Err(AppError::database_with_op(e.to_string(), "upsert pull request")),
    };
    tx.commit().await?;
    Ok(stored)
}

/// Insert or update a vulnerability alert keyed by `external_id`.
///
/// Revisions are taken as for [`upsert_pull_request`].
pub async fn upsert_vulnerability_alert(
    pool: &DbPool,
    alert: &NewVulnerabilityAlert,
) -> Result<VulnerabilityAlert, AppError> {
    let mut tx = pool.begin().await?;
    let revision = db::next_revision(&mut tx).await?;
    let now = db::now();
    let stored = match vulnerability_alerts::create(&mut tx, alert, revision, now).await {
        Ok(created) => created,
        Err(e) if db::is_unique_violation(&e) => {
            let existing = vulnerability_alerts::get_by_external_id(&mut tx, &alert.external_id)
                .await?
                .ok_or_else(|| AppError::not_found_with_id("Alert", &alert.external_id))?;
            vulnerability_alerts::update(&mut tx, existing.id, alert, revision, now).await?
        }
        Err(e) => {
            return Err(AppError::database_with_op(
                e.to_string(),
                "upsert vulnerability alert",
            ))
        }
    };
    tx.commit().await?;
    Ok(stored)
}

pub async fn get_repository_by_name(
    pool: &DbPool,
    name: &str,
) -> Result<Option<Repository>, AppError> {
    Ok(repositories::get_by_name(pool, name).await?)
}

pub async fn list_repositories_for_product(
    pool: &DbPool,
    product_id: i64,
) -> Result<Vec<Repository>, AppError> {
    Ok(repositories::list_by_product_tag(pool, product_id).await?)
}

pub async fn list_pull_requests_for_repository(
    pool: &DbPool,
    repository_name: &str,
) -> Result<Vec<PullRequest>, AppError> {
    Ok(pull_requests::list_by_repository(pool, repository_name).await?)
}

pub async fn list_alerts_for_repository(
    pool: &DbPool,
    repository_name: &str,
) -> Result<Vec<VulnerabilityAlert>, AppError> {
    Ok(vulnerability_alerts::list_by_repository(pool, repository_name).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_tenant, test_pool};
    use crate::models::{AlertState, PullRequestState, Severity};

    fn repo(name: &str, url: &str, topic: &str) -> NewRepository {
        NewRepository {
            name: name.to_string(),
            url: url.to_string(),
            topic: topic.to_string(),
            owner: "acme".to_string(),
        }
    }

    fn pr(external_id: &str, repository_name: &str) -> NewPullRequest {
        NewPullRequest {
            external_id: external_id.to_string(),
            title: "Bump deps".to_string(),
            repository_name: repository_name.to_string(),
            url: format!("https://github.com/acme/{}/pull/1", repository_name),
            state: PullRequestState::Open,
            author: "octocat".to_string(),
            merged_at: None,
            remote_created_at: None,
        }
    }

    fn alert(external_id: &str, repository_name: &str) -> NewVulnerabilityAlert {
        NewVulnerabilityAlert {
            external_id: external_id.to_string(),
            repository_name: repository_name.to_string(),
            package_name: "openssl".to_string(),
            state: AlertState::Open,
            severity: Severity::Critical,
            patched_version: None,
            fixed_at: None,
            remote_created_at: None,
        }
    }

    fn product(name: &str, tags: &[&str], tenant_id: Option<i64>) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            tenant_id,
        }
    }

    #[tokio::test]
    async fn test_repository_upsert_converges() {
        let (pool, _dir) = test_pool().await;
        let first = upsert_repository(&pool, &repo("r", "u1", "billing"))
            .await
            .unwrap();
        let second = upsert_repository(&pool, &repo("r", "u2", "billing"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let stored = get_repository_by_name(&pool, "r").await.unwrap().unwrap();
        assert_eq!(stored.url, "u2");
        assert_eq!(stored.id, first.id);
    }

    #[tokio::test]
    async fn test_pull_request_upsert_updates_state() {
        let (pool, _dir) = test_pool().await;
        let created = upsert_pull_request(&pool, &pr("PR_1", "api")).await.unwrap();

        let mut merged = pr("PR_1", "api");
        merged.state = PullRequestState::Merged;
        merged.title = "Bump deps (final)".to_string();
        let updated = upsert_pull_request(&pool, &merged).await.unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(updated.state_enum(), PullRequestState::Merged);
        assert_eq!(updated.title, "Bump deps (final)");
        assert_eq!(list_pull_requests_for_repository(&pool, "api").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_alert_upsert_updates_state() {
        let (pool, _dir) = test_pool().await;
        upsert_vulnerability_alert(&pool, &alert("RVA_1", "api"))
            .await
            .unwrap();

        let mut dismissed = alert("RVA_1", "api");
        dismissed.state = AlertState::Dismissed;
        upsert_vulnerability_alert(&pool, &dismissed).await.unwrap();

        let alerts = list_alerts_for_repository(&pool, "api").await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].state_enum(), AlertState::Dismissed);
    }

    #[tokio::test]
    async fn test_product_tags_are_normalized() {
        let (pool, _dir) = test_pool().await;
        let created = create_product(&pool, product("Payments", &[" billing ", "", "ledger"], None))
            .await
            .unwrap();
        assert_eq!(created.tags_vec(), vec!["billing", "ledger"]);

        let updated = update_product(&pool, created.id, product("Payments", &["ledger", " "], None))
            .await
            .unwrap();
        assert_eq!(updated.tags_vec(), vec!["ledger"]);

        let err = update_product(&pool, created.id + 1, product("x", &[], None))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_product_links_tenant() {
        let (pool, _dir) = test_pool().await;
        let tenant = insert_tenant(&pool, "acme", 0).await;
        let created = create_product(&pool, product("Payments", &["billing"], Some(tenant)))
            .await
            .unwrap();

        let linked = list_products_by_tenant(&pool, tenant).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, created.id);

        let err = create_product(&pool, product("Orphan", &[], Some(tenant + 100)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
        assert_eq!(list_products(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_product_moves_tenant_link() {
        let (pool, _dir) = test_pool().await;
        let acme = insert_tenant(&pool, "acme", 0).await;
        let globex = insert_tenant(&pool, "globex", 0).await;
        let created = create_product(&pool, product("Payments", &["billing"], Some(acme)))
            .await
            .unwrap();

        update_product(&pool, created.id, product("Payments", &["billing"], Some(globex)))
            .await
            .unwrap();
        assert!(list_products_by_tenant(&pool, acme).await.unwrap().is_empty());
        assert_eq!(list_products_by_tenant(&pool, globex).await.unwrap().len(), 1);

        let links: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product_tenant_links WHERE product_id = ?")
                .bind(created.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(links, 1);

        // A failed move keeps the previous link
        let err = update_product(&pool, created.id, product("Renamed", &[], Some(globex + 100)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
        assert_eq!(list_products_by_tenant(&pool, globex).await.unwrap().len(), 1);
        assert_eq!(get_product(&pool, created.id).await.unwrap().name, "Payments");

        // No tenant id leaves the link alone
        update_product(&pool, created.id, product("Payments", &["billing"], None))
            .await
            .unwrap();
        assert_eq!(list_products_by_tenant(&pool, globex).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tag_change_clears_notification_checkpoint() {
        let (pool, _dir) = test_pool().await;
        let acme = insert_tenant(&pool, "acme", 0).await;
        let created = create_product(&pool, product("Payments", &["billing"], Some(acme)))
            .await
            .unwrap();
        sqlx::query("UPDATE product_tenant_links SET notified_revision = 5")
            .execute(&pool)
            .await
            .unwrap();

        let checkpoint = |pool: DbPool| async move {
            sqlx::query_scalar::<_, Option<i64>>(
                "SELECT notified_revision FROM product_tenant_links",
            )
            .fetch_one(&pool)
            .await
            .unwrap()
        };

        // Same tags and tenant: the link is kept as is
        update_product(&pool, created.id, product("Renamed", &["billing"], Some(acme)))
            .await
            .unwrap();
        assert_eq!(checkpoint(pool.clone()).await, Some(5));

        update_product(&pool, created.id, product("Renamed", &["billing", "web"], None))
            .await
            .unwrap();
        assert_eq!(checkpoint(pool.clone()).await, None);
        assert_eq!(list_products_by_tenant(&pool, acme).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_product_cascades_to_its_tags_only() {
        let (pool, _dir) = test_pool().await;
        let payments = create_product(&pool, product("Payments", &["billing"], None))
            .await
            .unwrap();
        let search = create_product(&pool, product("Search", &["search"], None))
            .await
            .unwrap();

        upsert_repository(&pool, &repo("api", "u", "billing")).await.unwrap();
        upsert_repository(&pool, &repo("indexer", "u", "search")).await.unwrap();
        upsert_pull_request(&pool, &pr("PR_1", "api")).await.unwrap();
        upsert_pull_request(&pool, &pr("PR_2", "indexer")).await.unwrap();
        upsert_vulnerability_alert(&pool, &alert("RVA_1", "api")).await.unwrap();
        upsert_vulnerability_alert(&pool, &alert("RVA_2", "indexer")).await.unwrap();

        delete_product(&pool, payments.id).await.unwrap();

        assert!(get_product(&pool, payments.id).await.unwrap_err().is_not_found());
        assert!(get_repository_by_name(&pool, "api").await.unwrap().is_none());
        assert!(list_pull_requests_for_repository(&pool, "api").await.unwrap().is_empty());
        assert!(list_alerts_for_repository(&pool, "api").await.unwrap().is_empty());

        assert!(get_product(&pool, search.id).await.is_ok());
        assert_eq!(list_repositories_for_product(&pool, search.id).await.unwrap().len(), 1);
        assert_eq!(list_pull_requests_for_repository(&pool, "indexer").await.unwrap().len(), 1);
        assert_eq!(list_alerts_for_repository(&pool, "indexer").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_product_is_not_found() {
        let (pool, _dir) = test_pool().await;
        assert!(delete_product(&pool, 42).await.unwrap_err().is_not_found());
    }
}
