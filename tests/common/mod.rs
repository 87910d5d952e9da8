//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use repo_pulse_lib::db::{self, pool::DbPool};
use repo_pulse_lib::error::AppError;
use repo_pulse_lib::models::{Credential, NewProduct, NewTenant, Product, Tenant};
use repo_pulse_lib::services::catalog;
use repo_pulse_lib::services::github_client::{
    Advisory, AlertNode, Connection, Owner, PackageRef, PageInfo, PatchedVersion,
    PullRequestNode, RateLimits, RemoteClient, RemoteResponse, RepoEdge, RepoNode,
    RepositoryDetail, SearchResult, SecurityVulnerability,
};
use repo_pulse_lib::services::sync_engine::{SyncConfig, SyncEngine};
use repo_pulse_lib::services::tenant_registry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Create a migrated database in a fresh temp dir. Keep the `TempDir` alive.
pub async fn setup_db() -> (DbPool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::initialize(&db::get_db_path(dir.path())).await.unwrap();
    (pool, dir)
}

/// Create a tenant that is already past the staleness horizon.
pub async fn seed_stale_tenant(pool: &DbPool, namespace: &str) -> Tenant {
    let tenant = tenant_registry::create_tenant(
        pool,
        NewTenant {
            friendly_name: namespace.to_uppercase(),
            namespace: namespace.to_string(),
            credential: Credential::new(format!("secret-{}", namespace)),
            description: None,
            is_default: false,
        },
    )
    .await
    .unwrap();
    set_tenant_updated_at(pool, tenant.id, db::now() - 2 * 3600).await;
    tenant_registry::get_tenant(pool, tenant.id).await.unwrap()
}

pub async fn set_tenant_updated_at(pool: &DbPool, tenant_id: i64, updated_at: i64) {
    sqlx::query("UPDATE tenants SET updated_at = ? WHERE id = ?")
        .bind(updated_at)
        .bind(tenant_id)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn tenant_updated_at(pool: &DbPool, tenant_id: i64) -> i64 {
    tenant_registry::get_tenant(pool, tenant_id)
        .await
        .unwrap()
        .updated_at
}

pub async fn seed_product(pool: &DbPool, tenant_id: i64, name: &str, tags: &[&str]) -> Product {
    catalog::create_product(
        pool,
        NewProduct {
            name: name.to_string(),
            description: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            tenant_id: Some(tenant_id),
        },
    )
    .await
    .unwrap()
}

pub async fn count_rows(pool: &DbPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

pub fn repo_node(namespace: &str, name: &str) -> RepoNode {
    RepoNode {
        name: name.to_string(),
        url: format!("https://github.com/{}/{}", namespace, name),
        owner: Owner {
            login: namespace.to_string(),
        },
    }
}

pub fn pr_node(id: &str, state: &str) -> PullRequestNode {
    PullRequestNode {
        id: id.to_string(),
        state: state.to_string(),
        title: format!("Change {}", id),
        created_at: Some("2024-03-01T12:00:00Z".to_string()),
        merged_at: None,
        permalink: format!("https://github.com/acme/pulls/{}", id),
        author: Some(Owner {
            login: "octocat".to_string(),
        }),
    }
}

pub fn alert_node(id: &str, state: &str, severity: &str) -> AlertNode {
    AlertNode {
        id: id.to_string(),
        number: Some(1),
        state: state.to_string(),
        created_at: Some("2024-03-02T12:00:00Z".to_string()),
        fixed_at: None,
        security_vulnerability: SecurityVulnerability {
            package: PackageRef {
                name: "left-pad".to_string(),
            },
            advisory: Advisory {
                severity: severity.to_string(),
            },
            first_patched_version: Some(PatchedVersion {
                identifier: "1.3.0".to_string(),
            }),
            updated_at: None,
        },
    }
}

pub fn detail(
    namespace: &str,
    name: &str,
    prs: Vec<PullRequestNode>,
    alerts: Vec<AlertNode>,
) -> RepositoryDetail {
    RepositoryDetail {
        name: name.to_string(),
        url: format!("https://github.com/{}/{}", namespace, name),
        owner: Owner {
            login: namespace.to_string(),
        },
        pull_requests: Connection { nodes: prs },
        vulnerability_alerts: Connection { nodes: alerts },
    }
}

fn rate_limits() -> RateLimits {
    RateLimits {
        limit: Some(5000),
        remaining: Some(4999),
        used: Some(1),
    }
}

/// Scripted in-memory remote platform.
#[derive(Default)]
pub struct MockRemote {
    search_results: Mutex<HashMap<(String, String), Vec<RepoNode>>>,
    details: Mutex<HashMap<(String, String), RepositoryDetail>>,
    failing_namespaces: Mutex<HashSet<String>>,
    failing_details: Mutex<HashSet<String>>,
    detail_delays: Mutex<HashMap<String, Duration>>,
    hang_searches: Mutex<bool>,
    gate: Mutex<Option<Arc<Notify>>>,
    search_entered: Notify,
    search_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    credentials_seen: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_search(&self, namespace: &str, topic: &str, repos: Vec<RepoNode>) {
        self.search_results
            .lock()
            .unwrap()
            .insert((namespace.to_string(), topic.to_string()), repos);
    }

    pub fn add_detail(&self, namespace: &str, detail: RepositoryDetail) {
        self.details
            .lock()
            .unwrap()
            .insert((namespace.to_string(), detail.name.clone()), detail);
    }

    pub fn fail_namespace(&self, namespace: &str) {
        self.failing_namespaces
            .lock()
            .unwrap()
            .insert(namespace.to_string());
    }

    pub fn fail_detail(&self, repo_name: &str) {
        self.failing_details
            .lock()
            .unwrap()
            .insert(repo_name.to_string());
    }

    pub fn delay_detail(&self, repo_name: &str, delay: Duration) {
        self.detail_delays
            .lock()
            .unwrap()
            .insert(repo_name.to_string(), delay);
    }

    /// Make every search wait forever.
    pub fn hang_searches(&self) {
        *self.hang_searches.lock().unwrap() = true;
    }

    /// Make searches wait until the returned `Notify` is notified.
    pub fn gate_searches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Resolves once a search call has started.
    pub async fn wait_for_search(&self) {
        self.search_entered.notified().await;
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.search_calls() + self.detail_calls()
    }

    pub fn credentials_seen(&self) -> Vec<String> {
        self.credentials_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn search_repositories(
        &self,
        namespace: &str,
        topic: &str,
        credential: &Credential,
    ) -> Result<RemoteResponse<SearchResult>, AppError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.credentials_seen
            .lock()
            .unwrap()
            .push(credential.expose().to_string());
        self.search_entered.notify_one();

        let hang = *self.hang_searches.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing_namespaces.lock().unwrap().contains(namespace) {
            return Err(AppError::network("Failed to connect to server"));
        }

        let repos = self
            .search_results
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), topic.to_string()))
            .cloned()
            .unwrap_or_default();

        Ok(RemoteResponse {
            data: SearchResult {
                repos: repos
                    .into_iter()
                    .map(|repo| RepoEdge { repo: Some(repo) })
                    .collect(),
                page_info: PageInfo::default(),
            },
            rate_limits: rate_limits(),
        })
    }

    async fn get_repository_detail(
        &self,
        namespace: &str,
        repo_name: &str,
        _credential: &Credential,
    ) -> Result<RemoteResponse<RepositoryDetail>, AppError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.detail_delays.lock().unwrap().get(repo_name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_details.lock().unwrap().contains(repo_name) {
            return Err(AppError::remote_payload([format!(
                "Could not resolve to a Repository with the name '{}'",
                repo_name
            )]));
        }

        let detail = self
            .details
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), repo_name.to_string()))
            .cloned()
            .unwrap_or_else(|| detail(namespace, repo_name, Vec::new(), Vec::new()));

        Ok(RemoteResponse {
            data: detail,
            rate_limits: rate_limits(),
        })
    }
}

pub fn engine(pool: &DbPool, remote: Arc<MockRemote>) -> SyncEngine {
    SyncEngine::new(pool.clone(), remote, SyncConfig::default())
}

pub fn engine_with_config(pool: &DbPool, remote: Arc<MockRemote>, config: SyncConfig) -> SyncEngine {
    SyncEngine::new(pool.clone(), remote, config)
}
