//! Sync engine.
//!
//! Mirrors remote state into the local store, fanning out
//! tenant → product → tag → repository → detail. Tenants are processed one
//! at a time. Failure handling by level:
//! - a failing tenant is logged and the pass moves on to the next tenant
//! - product, tag and entity-write failures abort the tenant pass
//! - a failing per-repository detail fetch is logged and skipped
//!
//! Upsert cascades run without a surrounding transaction; a pass that fails
//! halfway leaves valid partial state that the next pass reconciles.

use crate::db::{self, pool::DbPool, sync_log};
use crate::error::AppError;
use crate::models::{
    AlertState, Credential, LogStatus, NewPullRequest, NewRepository, NewVulnerabilityAlert,
    Product, PullRequestState, Severity, SyncLog, TenantView,
};
use crate::services::catalog;
use crate::services::github_client::{
    AlertNode, PullRequestNode, RateLimits, RemoteClient, RepoNode, RepositoryDetail,
};
use crate::services::tenant_registry;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Tenants not synced for this long are picked up by a pass.
pub const DEFAULT_STALENESS_SECS: u64 = 60 * 60;

/// Interval between scheduled sync passes.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 2 * 60;

/// Interval between notification retention sweeps.
pub const DEFAULT_RETENTION_INTERVAL_SECS: u64 = 10 * 60;

/// Maximum concurrent repository detail fetches within one tag.
pub const DEFAULT_DETAIL_CONCURRENCY: usize = 4;

/// Login recorded for pull requests whose author account no longer exists.
const GHOST_AUTHOR: &str = "ghost";

/// Sync engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Staleness horizon in seconds.
    pub staleness_secs: u64,

    /// Sync tick in seconds.
    pub sync_interval_secs: u64,

    /// Retention tick in seconds.
    pub retention_interval_secs: u64,

    /// Notifications older than `now - retention_horizon_secs` are swept.
    /// Zero sweeps everything created before the sweep.
    pub retention_horizon_secs: u64,

    /// Concurrent detail fetches per tag.
    pub detail_concurrency: usize,

    /// Per-request timeout for the remote client.
    pub request_timeout_secs: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            staleness_secs: DEFAULT_STALENESS_SECS,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            retention_interval_secs: DEFAULT_RETENTION_INTERVAL_SECS,
            retention_horizon_secs: 0,
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
            request_timeout_secs: None,
        }
    }
}

/// Status of the sync engine.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Whether a pass is currently running.
    pub is_syncing: bool,

    /// Finish time of the last all-tenants pass.
    pub last_sync_time: Option<i64>,

    /// Last tenant error message.
    pub last_error: Option<String>,

    /// Rate limits reported by the most recent remote response.
    pub last_rate_limits: Option<RateLimits>,
}

/// Entity counts written by a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub repositories: u64,
    pub pull_requests: u64,
    pub alerts: u64,
    /// Detail fetches that failed and were skipped.
    pub detail_failures: u64,
}

impl SyncStats {
    fn absorb(&mut self, other: SyncStats) {
        self.repositories += other.repositories;
        self.pull_requests += other.pull_requests;
        self.alerts += other.alerts;
        self.detail_failures += other.detail_failures;
    }
}

/// Result of an all-tenants pass.
#[derive(Debug, Default)]
pub struct SyncResult {
    pub tenants_synced: usize,
    pub tenants_failed: usize,
    pub stats: SyncStats,

    /// One message per failed tenant.
    pub errors: Vec<String>,

    pub duration_ms: i64,
}

/// Removes a tenant from the in-flight set when dropped.
struct TenantGuard {
    tenant_id: i64,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl Drop for TenantGuard {
    fn drop(&mut self) {
        let mut set = match self.in_flight.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.remove(&self.tenant_id);
    }
}

/// Clears `is_syncing` even if the pass future is dropped mid-way.
struct SyncingGuard<'a> {
    status: &'a Mutex<SyncStatus>,
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        let mut status = match self.status.lock() {
            Ok(status) => status,
            Err(poisoned) => poisoned.into_inner(),
        };
        status.is_syncing = false;
    }
}

/// The sync engine.
pub struct SyncEngine {
    pool: DbPool,
    client: Arc<dyn RemoteClient>,
    config: SyncConfig,
    status: Mutex<SyncStatus>,
    in_flight: Arc<Mutex<HashSet<i64>>>,
}

impl SyncEngine {
    pub fn new(pool: DbPool, client: Arc<dyn RemoteClient>, config: SyncConfig) -> Self {
        Self {
            pool,
            client,
            config,
            status: Mutex::new(SyncStatus::default()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> SyncStatus {
        match self.status.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update_status(&self, f: impl FnOnce(&mut SyncStatus)) {
        let mut status = match self.status.lock() {
            Ok(status) => status,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut status);
    }

    fn record_rate_limits(&self, rate_limits: RateLimits) {
        if rate_limits.remaining == Some(0) {
            log::warn!("[sync] Remote rate limit exhausted");
        }
        self.update_status(|s| s.last_rate_limits = Some(rate_limits));
    }

    /// Reserve a tenant for this pass, failing if another pass holds it.
    fn acquire_tenant(&self, tenant_id: i64) -> Result<TenantGuard, AppError> {
        let mut set = match self.in_flight.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !set.insert(tenant_id) {
            return Err(AppError::sync_for_tenant(
                "Sync already in progress for tenant",
                tenant_id,
            ));
        }
        Ok(TenantGuard {
            tenant_id,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Sync every tenant whose last sync is older than the staleness horizon.
    ///
    /// Only the stale-tenant lookup can fail; tenant errors are logged and
    /// collected in the result.
    pub async fn sync_all_stale(&self) -> Result<SyncResult, AppError> {
        let start = Instant::now();
        self.update_status(|s| s.is_syncing = true);
        let _syncing = SyncingGuard {
            status: &self.status,
        };

        let tenants = tenant_registry::list_stale(&self.pool, self.config.staleness_secs).await?;
        log::info!("[sync] {} stale tenant(s)", tenants.len());

        let mut result = SyncResult::default();
        for tenant in tenants {
            match self.sync_tenant(tenant.id).await {
                Ok(stats) => {
                    result.tenants_synced += 1;
                    result.stats.absorb(stats);
                }
                Err(e) => {
                    let level = if e.is_remote() {
                        log::Level::Warn
                    } else {
                        log::Level::Error
                    };
                    log::log!(
                        level,
                        "[sync] Tenant {} ({}) failed: {}",
                        tenant.id,
                        tenant.namespace,
                        e
                    );
                    result.tenants_failed += 1;
                    result
                        .errors
                        .push(format!("{}: {}", tenant.namespace, e));
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as i64;
        let finished_at = db::now();
        self.update_status(|s| {
            s.last_sync_time = Some(finished_at);
            s.last_error = result.errors.last().cloned();
        });

        let (status, message) = if result.errors.is_empty() {
            (
                LogStatus::Success,
                format!(
                    "{} tenant(s), {} repositories, {} pull requests, {} alerts",
                    result.tenants_synced,
                    result.stats.repositories,
                    result.stats.pull_requests,
                    result.stats.alerts
                ),
            )
        } else {
            (
                LogStatus::Error,
                format!(
                    "{} of {} tenant(s) failed",
                    result.tenants_failed,
                    result.tenants_failed + result.tenants_synced
                ),
            )
        };
        self.log_sync_operation("sync_complete", status, None, Some(&message), result.duration_ms)
            .await;

        Ok(result)
    }

    /// Sync all products of one tenant and stamp the tenant on success.
    ///
    /// A tenant without products is left untouched, including its stamp.
    pub async fn sync_tenant(&self, tenant_id: i64) -> Result<SyncStats, AppError> {
        let _guard = self.acquire_tenant(tenant_id)?;
        let start = Instant::now();

        let result = self.sync_tenant_locked(tenant_id).await;
        let duration_ms = start.elapsed().as_millis() as i64;

        match &result {
            Ok(Some(stats)) => {
                let message = format!(
                    "{} repositories, {} pull requests, {} alerts, {} detail failures",
                    stats.repositories, stats.pull_requests, stats.alerts, stats.detail_failures
                );
                self.log_sync_operation(
                    "sync_tenant",
                    LogStatus::Success,
                    Some(tenant_id),
                    Some(&message),
                    duration_ms,
                )
                .await;
            }
            Ok(None) => {}
            Err(e) => {
                self.log_sync_operation(
                    "sync_tenant",
                    LogStatus::Error,
                    Some(tenant_id),
                    Some(&e.to_string()),
                    duration_ms,
                )
                .await;
            }
        }

        result.map(Option::unwrap_or_default)
    }

    /// Returns `None` when the tenant has no products.
    async fn sync_tenant_locked(&self, tenant_id: i64) -> Result<Option<SyncStats>, AppError> {
        let products = catalog::list_products_by_tenant(&self.pool, tenant_id).await?;
        let Some(first) = products.first() else {
            log::debug!("[sync] Tenant {} has no products", tenant_id);
            return Ok(None);
        };

        let tenant = tenant_registry::resolve_for_product(&self.pool, first.id).await?;
        if tenant.id != tenant_id {
            return Err(AppError::sync_for_tenant(
                format!("Product {} resolves to a different tenant", first.id),
                tenant_id,
            ));
        }
        log::info!(
            "[sync] Syncing tenant {} ({}), {} product(s)",
            tenant.id,
            tenant.namespace,
            products.len()
        );

        let mut stats = SyncStats::default();
        for product in &products {
            stats.absorb(self.sync_product_internal(product, &tenant).await?);
        }

        tenant_registry::mark_synced(&self.pool, tenant_id).await?;
        Ok(Some(stats))
    }

    /// Sync one product on demand, under its tenant's single-flight slot.
    pub async fn sync_product(&self, product_id: i64) -> Result<SyncStats, AppError> {
        let product = catalog::get_product(&self.pool, product_id).await?;
        let tenant = tenant_registry::resolve_for_product(&self.pool, product_id).await?;
        let _guard = self.acquire_tenant(tenant.id)?;

        self.sync_product_internal(&product, &tenant).await
    }

    async fn sync_product_internal(
        &self,
        product: &Product,
        tenant: &TenantView,
    ) -> Result<SyncStats, AppError> {
        let mut stats = SyncStats::default();
        for tag in product.tags_vec() {
            stats.absorb(
                self.sync_tag(&tag, &tenant.namespace, &tenant.credential)
                    .await?,
            );
        }

        catalog::mark_product_synced(&self.pool, product.id).await?;
        log::debug!(
            "[sync] Product {} ({}) synced: {} repositories",
            product.id,
            product.name,
            stats.repositories
        );
        Ok(stats)
    }

    /// Mirror every repository tagged `tag` in `namespace`.
    ///
    /// Writes happen in discovery order: all repositories first, then each
    /// repository's pull requests followed by its alerts. Detail fetches run
    /// ahead with bounded concurrency.
    pub async fn sync_tag(
        &self,
        tag: &str,
        namespace: &str,
        credential: &Credential,
    ) -> Result<SyncStats, AppError> {
        let topic = tag.trim();
        let mut stats = SyncStats::default();
        if topic.is_empty() {
            return Ok(stats);
        }

        let search = self
            .client
            .search_repositories(namespace, topic, credential)
            .await?;
        self.record_rate_limits(search.rate_limits);

        let repos: Vec<RepoNode> = search.data.repositories().cloned().collect();
        if search.data.page_info.has_next_page {
            log::warn!(
                "[sync] More than one page of repositories for {}/{}; only the first is mirrored",
                namespace,
                topic
            );
        }

        for node in &repos {
            catalog::upsert_repository(
                &self.pool,
                &NewRepository {
                    name: node.name.clone(),
                    url: node.url.clone(),
                    topic: topic.to_string(),
                    owner: node.owner.login.clone(),
                },
            )
            .await?;
            stats.repositories += 1;
        }

        // Each fetch owns its inputs so the pass future stays `Send`
        let fetches: Vec<_> = repos
            .into_iter()
            .map(|node| {
                let client = Arc::clone(&self.client);
                let namespace = namespace.to_string();
                let credential = credential.clone();
                async move {
                    let result = client
                        .get_repository_detail(&namespace, &node.name, &credential)
                        .await;
                    (node, result)
                }
            })
            .collect();
        let mut details =
            stream::iter(fetches).buffered(self.config.detail_concurrency.max(1));

        while let Some((node, result)) = details.next().await {
            match result {
                Ok(response) => {
                    self.record_rate_limits(response.rate_limits);
                    self.store_detail(&node.name, &response.data, &mut stats)
                        .await?;
                }
                Err(e) => {
                    log::warn!(
                        "[sync] Detail fetch failed for {}/{}: {}",
                        namespace,
                        node.name,
                        e
                    );
                    stats.detail_failures += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn store_detail(
        &self,
        repository_name: &str,
        detail: &RepositoryDetail,
        stats: &mut SyncStats,
    ) -> Result<(), AppError> {
        for node in &detail.pull_requests.nodes {
            catalog::upsert_pull_request(&self.pool, &pull_request_from_node(repository_name, node))
                .await?;
            stats.pull_requests += 1;
        }
        for node in &detail.vulnerability_alerts.nodes {
            catalog::upsert_vulnerability_alert(&self.pool, &alert_from_node(repository_name, node))
                .await?;
            stats.alerts += 1;
        }
        Ok(())
    }

    /// Append to the sync log. Failures are logged, never propagated.
    async fn log_sync_operation(
        &self,
        operation: &str,
        status: LogStatus,
        tenant_id: Option<i64>,
        message: Option<&str>,
        duration_ms: i64,
    ) {
        if let Err(e) = sync_log::insert(
            &self.pool,
            operation,
            status,
            tenant_id,
            message,
            Some(duration_ms),
            db::now(),
        )
        .await
        {
            log::warn!("[sync] Failed to write sync log: {}", e);
        }
    }

    /// Recent sync log entries, newest first.
    pub async fn get_sync_log(&self, limit: i64) -> Result<Vec<SyncLog>, AppError> {
        let limit = limit.clamp(1, SyncLog::MAX_ENTRIES);
        Ok(sync_log::list(&self.pool, limit).await?)
    }
}

fn pull_request_from_node(repository_name: &str, node: &PullRequestNode) -> NewPullRequest {
    NewPullRequest {
        external_id: node.id.clone(),
        title: node.title.clone(),
        repository_name: repository_name.to_string(),
        url: node.permalink.clone(),
        state: PullRequestState::from(node.state.as_str()),
        author: node
            .author
            .as_ref()
            .map(|a| a.login.clone())
            .unwrap_or_else(|| GHOST_AUTHOR.to_string()),
        merged_at: node.merged_at.as_deref().and_then(parse_timestamp),
        remote_created_at: node.created_at.as_deref().and_then(parse_timestamp),
    }
}

fn alert_from_node(repository_name: &str, node: &AlertNode) -> NewVulnerabilityAlert {
    let vulnerability = &node.security_vulnerability;
    NewVulnerabilityAlert {
        external_id: node.id.clone(),
        repository_name: repository_name.to_string(),
        package_name: vulnerability.package.name.clone(),
        state: AlertState::from(node.state.as_str()),
        severity: Severity::from(vulnerability.advisory.severity.as_str()),
        patched_version: vulnerability
            .first_patched_version
            .as_ref()
            .map(|v| v.identifier.clone()),
        fixed_at: node.fixed_at.as_deref().and_then(parse_timestamp),
        remote_created_at: node.created_at.as_deref().and_then(parse_timestamp),
    }
}

/// Parse an RFC 3339 timestamp to Unix seconds.
fn parse_timestamp(s: &str) -> Option<i64> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::github_client::{
        Advisory, PackageRef, PatchedVersion, SecurityVulnerability,
    };

    #[test]
    fn test_default_config_constants() {
        let config = SyncConfig::default();
        assert_eq!(config.staleness_secs, 3600);
        assert_eq!(config.sync_interval_secs, 120);
        assert_eq!(config.retention_interval_secs, 600);
        assert_eq!(config.retention_horizon_secs, 0);
    }

    #[test]
    fn test_config_partial_override() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"detail_concurrency": 1, "staleness_secs": 60}"#).unwrap();
        assert_eq!(config.detail_concurrency, 1);
        assert_eq!(config.staleness_secs, 60);
        assert_eq!(config.sync_interval_secs, DEFAULT_SYNC_INTERVAL_SECS);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(1_704_067_200));
        assert_eq!(parse_timestamp("2024-01-01T01:00:00+01:00"), Some(1_704_067_200));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_pull_request_from_node_defaults_missing_author() {
        let node = PullRequestNode {
            id: "PR_kw1".to_string(),
            state: "merged".to_string(),
            title: "Fix".to_string(),
            created_at: Some("2024-01-01T00:00:00Z".to_string()),
            merged_at: Some("2024-01-02T00:00:00Z".to_string()),
            permalink: "https://github.com/acme/api/pull/1".to_string(),
            author: None,
        };

        let pr = pull_request_from_node("api", &node);
        assert_eq!(pr.author, "ghost");
        assert_eq!(pr.state, PullRequestState::Merged);
        assert_eq!(pr.repository_name, "api");
        assert_eq!(pr.merged_at, Some(1_704_153_600));
    }

    #[test]
    fn test_alert_from_node() {
        let node = AlertNode {
            id: "RVA_kw1".to_string(),
            number: Some(7),
            state: "AUTO_DISMISSED".to_string(),
            created_at: None,
            fixed_at: None,
            security_vulnerability: SecurityVulnerability {
                package: PackageRef {
                    name: "lodash".to_string(),
                },
                advisory: Advisory {
                    severity: "MODERATE".to_string(),
                },
                first_patched_version: Some(PatchedVersion {
                    identifier: "4.17.21".to_string(),
                }),
                updated_at: None,
            },
        };

        let alert = alert_from_node("api", &node);
        assert_eq!(alert.state, AlertState::AutoDismissed);
        assert_eq!(alert.severity, Severity::Moderate);
        assert_eq!(alert.patched_version.as_deref(), Some("4.17.21"));
        assert!(alert.remote_created_at.is_none());
    }
}
