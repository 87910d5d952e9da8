//! Sync commands for managing background synchronization.
//!
//! These commands provide access to sync status and control.

use crate::error::AppError;
use crate::models::SyncLog;
use crate::services::scheduler::SchedulerHandle;
use crate::services::sync_engine::{SyncConfig, SyncEngine, SyncStats, SyncStatus};
use serde::Serialize;
use std::sync::Arc;
use tauri::State;

/// Number of log entries returned with the status.
const STATUS_LOG_ENTRIES: i64 = 10;

/// Response for get_sync_status command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSyncStatusResponse {
    #[serde(flatten)]
    pub status: SyncStatus,
    /// Recent sync log entries.
    pub recent_logs: Vec<SyncLog>,
}

/// Trigger an immediate sync pass.
///
/// The pass runs in the background; poll get_sync_status for results.
#[tauri::command]
pub async fn trigger_sync(scheduler: State<'_, SchedulerHandle>) -> Result<(), AppError> {
    scheduler.trigger_sync().await
}

/// Sync one tenant now and wait for the outcome.
#[tauri::command]
pub async fn sync_tenant(
    engine: State<'_, Arc<SyncEngine>>,
    tenant_id: i64,
) -> Result<SyncStats, AppError> {
    engine.sync_tenant(tenant_id).await
}

/// Sync one product now and wait for the outcome.
#[tauri::command]
pub async fn sync_product(
    engine: State<'_, Arc<SyncEngine>>,
    product_id: i64,
) -> Result<SyncStats, AppError> {
    engine.sync_product(product_id).await
}

#[tauri::command]
pub async fn get_sync_status(
    engine: State<'_, Arc<SyncEngine>>,
) -> Result<GetSyncStatusResponse, AppError> {
    let recent_logs = engine.get_sync_log(STATUS_LOG_ENTRIES).await?;
    Ok(GetSyncStatusResponse {
        status: engine.status(),
        recent_logs,
    })
}

#[tauri::command]
pub async fn get_sync_log(
    engine: State<'_, Arc<SyncEngine>>,
    limit: Option<i64>,
) -> Result<Vec<SyncLog>, AppError> {
    engine.get_sync_log(limit.unwrap_or(SyncLog::MAX_ENTRIES)).await
}

#[tauri::command]
pub async fn get_sync_config(engine: State<'_, Arc<SyncEngine>>) -> Result<SyncConfig, AppError> {
    Ok(engine.config().clone())
}
