//! Notification commands.
//!
//! The frontend listens for `UNREAD_NOTIFICATIONS` and then pulls the list
//! through these commands.

use crate::error::AppError;
use crate::models::{Notification, NotificationStatus};
use crate::services::notifier::Notifier;
use std::sync::Arc;
use tauri::State;

#[tauri::command]
pub async fn list_notifications(
    notifier: State<'_, Arc<Notifier>>,
    tenant_id: Option<i64>,
    status: Option<NotificationStatus>,
) -> Result<Vec<Notification>, AppError> {
    notifier.list_notifications(tenant_id, status).await
}

#[tauri::command]
pub async fn get_unread_count(
    notifier: State<'_, Arc<Notifier>>,
    tenant_id: Option<i64>,
) -> Result<i64, AppError> {
    notifier.unread_count(tenant_id).await
}

#[tauri::command]
pub async fn mark_notification_read(
    notifier: State<'_, Arc<Notifier>>,
    id: i64,
) -> Result<(), AppError> {
    notifier.mark_read(id).await
}

/// Returns how many notifications were marked.
#[tauri::command]
pub async fn mark_all_notifications_read(
    notifier: State<'_, Arc<Notifier>>,
    tenant_id: i64,
) -> Result<u64, AppError> {
    notifier.mark_all_read(tenant_id).await
}
