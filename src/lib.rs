//! Repo Pulse - local mirror of remote repositories, pull requests and
//! vulnerability alerts.
//!
//! The library hosts the sync engine, change notifier and scheduler. The
//! headless binary and the optional desktop shell (feature `desktop`) both
//! bootstrap through [`AppContext`].

#[cfg(feature = "desktop")]
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use config::AppConfig;
use db::pool::DbPool;
use error::AppError;
use services::github_client::{GitHubClient, GitHubClientConfig, RemoteClient};
use services::{EventEmitter, Notifier, Scheduler, SyncEngine};
use std::sync::Arc;

/// Everything a host needs to run the sync core.
pub struct AppContext {
    pub config: AppConfig,
    pub pool: DbPool,
    pub engine: Arc<SyncEngine>,
    pub notifier: Arc<Notifier>,
}

impl AppContext {
    /// Open the store and wire the production remote client.
    pub async fn initialize(
        config: AppConfig,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<Self, AppError> {
        let db_path = config.db_path();
        log::info!("Opening database at {}", db_path.display());
        let pool = db::initialize(&db_path).await?;

        let client = GitHubClient::new(GitHubClientConfig {
            endpoint: config.github_endpoint.clone(),
            timeout_secs: config.sync.request_timeout_secs,
        })?;

        Ok(Self::with_client(config, pool, Arc::new(client), emitter))
    }

    /// Wire the services around an existing pool and remote client.
    pub fn with_client(
        config: AppConfig,
        pool: DbPool,
        client: Arc<dyn RemoteClient>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let engine = Arc::new(SyncEngine::new(pool.clone(), client, config.sync.clone()));
        let notifier = Arc::new(
            Notifier::new(pool.clone(), emitter)
                .with_retention_horizon(config.sync.retention_horizon_secs),
        );

        Self {
            config,
            pool,
            engine,
            notifier,
        }
    }

    /// A stopped scheduler driving this context's engine and notifier.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(Arc::clone(&self.engine), Arc::clone(&self.notifier))
    }
}

/// Tauri builder with the sync core wired in.
///
/// The shell crate owns `tauri.conf.json` and finishes with
/// `.build(tauri::generate_context!())`. The scheduler runs until the managed
/// `CancellationToken` is cancelled, typically on `RunEvent::Exit`.
#[cfg(feature = "desktop")]
pub fn desktop_builder() -> tauri::Builder<tauri::Wry> {
    use commands::*;
    use tauri::Manager;
    use tokio_util::sync::CancellationToken;

    tauri::Builder::default()
        .setup(|app| {
            let config = AppConfig::from_env()?;
            let emitter: Arc<dyn EventEmitter> = Arc::new(app.handle().clone());

            // Run async initialization in a blocking context
            let context =
                tauri::async_runtime::block_on(AppContext::initialize(config, emitter))?;

            let shutdown = CancellationToken::new();
            let mut scheduler = context.scheduler();
            let handle = tauri::async_runtime::block_on(async { scheduler.start(&shutdown) })?;

            app.manage(context.pool.clone());
            app.manage(Arc::clone(&context.engine));
            app.manage(Arc::clone(&context.notifier));
            app.manage(handle);
            app.manage(shutdown);

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            list_tenants,
            get_tenant,
            get_default_tenant,
            create_tenant,
            update_tenant,
            set_default_tenant,
            delete_tenant,
            list_products,
            get_product,
            create_product,
            update_product,
            delete_product,
            list_product_repositories,
            list_repository_pull_requests,
            list_repository_alerts,
            list_notifications,
            get_unread_count,
            mark_notification_read,
            mark_all_notifications_read,
            trigger_sync,
            sync_tenant,
            sync_product,
            get_sync_status,
            get_sync_log,
            get_sync_config,
        ])
}
