//! Change notifier.
//!
//! Turns newly observed open pull requests and vulnerability alerts into
//! unread notifications, one per `(tenant, external id, type)`, and signals
//! the host once per pass that created any.
//!
//! Every pull request and alert write takes the next change revision, and
//! every product-tenant link remembers the highest revision already
//! considered through it. A pass snapshots the current revision, considers
//! rows between each link's checkpoint and the snapshot, and advances the
//! checkpoints in the insert transaction. Revisions follow commit order, so
//! a row written during a pass is left for the next one, and a retention
//! sweep never causes unchanged rows to be announced again. A link created
//! after the snapshot keeps its empty checkpoint.

use crate::db::{
    self, notifications, pool::DbPool, products, pull_requests, vulnerability_alerts,
};
use crate::error::AppError;
use crate::models::{Notification, NotificationStatus, NotificationType, PendingNotification};
use crate::services::sync_events::{
    EventEmitter, UnreadNotificationsPayload, UNREAD_NOTIFICATIONS_EVENT,
};
use std::sync::Arc;

pub struct Notifier {
    pool: DbPool,
    emitter: Arc<dyn EventEmitter>,
    retention_horizon_secs: u64,
}

impl Notifier {
    pub fn new(pool: DbPool, emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            pool,
            emitter,
            retention_horizon_secs: 0,
        }
    }

    /// Keep notifications younger than `secs` during scheduled sweeps.
    pub fn with_retention_horizon(mut self, secs: u64) -> Self {
        self.retention_horizon_secs = secs;
        self
    }

    /// Create unread notifications for everything not yet announced.
    ///
    /// Returns the number of notifications created. The host event is
    /// emitted once if that number is non-zero.
    pub async fn emit_unread_notifications(&self) -> Result<u64, AppError> {
        let up_to_link = products::max_link_id(&self.pool).await?;
        let up_to_revision = db::current_revision(&self.pool).await?;
        let pending_prs = pull_requests::recent(&self.pool, up_to_revision).await?;
        let pending_alerts = vulnerability_alerts::recent(&self.pool, up_to_revision).await?;

        let now = db::now();
        let mut tx = self.pool.begin().await?;
        let mut created = 0;
        created +=
            insert_pending(&mut tx, &pending_prs, NotificationType::OpenPullRequest, now).await?;
        created +=
            insert_pending(&mut tx, &pending_alerts, NotificationType::OpenSecurityAlert, now)
                .await?;
        products::advance_link_checkpoints(&mut tx, up_to_link, up_to_revision).await?;
        tx.commit().await?;

        if created > 0 {
            log::info!("[notify] Created {} unread notification(s)", created);
            let payload = serde_json::to_value(UnreadNotificationsPayload { created })?;
            if let Err(e) = self.emitter.emit_event(UNREAD_NOTIFICATIONS_EVENT, payload) {
                log::warn!("[notify] Failed to signal host: {}", e);
            }
        }

        Ok(created)
    }

    /// Delete notifications created strictly before `cutoff`.
    pub async fn prune_notifications(&self, cutoff: i64) -> Result<u64, AppError> {
        let deleted = notifications::delete_before(&self.pool, cutoff).await?;
        if deleted > 0 {
            log::info!("[notify] Pruned {} notification(s)", deleted);
        }
        Ok(deleted)
    }

    /// Scheduled sweep: prune everything older than the retention horizon.
    pub async fn prune_expired(&self) -> Result<u64, AppError> {
        let cutoff = db::seconds_before_now(self.retention_horizon_secs).ok_or_else(|| {
            AppError::config(format!(
                "Retention horizon {}s is out of range",
                self.retention_horizon_secs
            ))
        })?;
        self.prune_notifications(cutoff).await
    }

    pub async fn list_notifications(
        &self,
        tenant_id: Option<i64>,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<Notification>, AppError> {
        Ok(notifications::list(&self.pool, tenant_id, status).await?)
    }

    pub async fn unread_count(&self, tenant_id: Option<i64>) -> Result<i64, AppError> {
        Ok(notifications::unread_count(&self.pool, tenant_id).await?)
    }

    pub async fn mark_read(&self, id: i64) -> Result<(), AppError> {
        if !notifications::update_status(&self.pool, id, NotificationStatus::Read, db::now()).await?
        {
            return Err(AppError::not_found_with_id("Notification", id));
        }
        Ok(())
    }

    /// Returns how many notifications changed.
    pub async fn mark_all_read(&self, tenant_id: i64) -> Result<u64, AppError> {
        Ok(notifications::mark_all_read(&self.pool, tenant_id, db::now()).await?)
    }
}

async fn insert_pending(
    conn: &mut sqlx::SqliteConnection,
    pending: &[PendingNotification],
    notification_type: NotificationType,
    now: i64,
) -> Result<u64, AppError> {
    let mut created = 0;
    for row in pending {
        created += notifications::create_if_absent(
            conn,
            row.tenant_id,
            &row.external_id,
            notification_type,
            &notification_type.content_for(&row.repository_name),
            now,
        )
        .await?;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_tenant, test_pool};
    use crate::services::sync_events::RecordingEmitter;

    async fn seed_notification(pool: &DbPool, tenant_id: i64, external_id: &str, created_at: i64) {
        let mut conn = pool.acquire().await.unwrap();
        notifications::create_if_absent(
            &mut conn,
            tenant_id,
            external_id,
            NotificationType::OpenPullRequest,
            "api: New pull request",
            created_at,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_retention_sweep_keeps_future_rows() {
        let (pool, _dir) = test_pool().await;
        let tenant = insert_tenant(&pool, "acme", 0).await;
        let now = db::now();
        seed_notification(&pool, tenant, "day-old", now - 86_400).await;
        seed_notification(&pool, tenant, "minute-old", now - 60).await;
        seed_notification(&pool, tenant, "skewed", now + 60).await;

        let notifier = Notifier::new(pool.clone(), Arc::new(RecordingEmitter::new()));
        assert_eq!(notifier.prune_notifications(now).await.unwrap(), 2);

        let remaining = notifier.list_notifications(None, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].external_id, "skewed");
    }

    #[tokio::test]
    async fn test_prune_expired_honours_horizon() {
        let (pool, _dir) = test_pool().await;
        let tenant = insert_tenant(&pool, "acme", 0).await;
        let now = db::now();
        seed_notification(&pool, tenant, "old", now - 7200).await;
        seed_notification(&pool, tenant, "recent", now - 60).await;

        let notifier = Notifier::new(pool.clone(), Arc::new(RecordingEmitter::new()))
            .with_retention_horizon(3600);
        assert_eq!(notifier.prune_expired().await.unwrap(), 1);
        assert_eq!(notifier.unread_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prune_expired_rejects_out_of_range_horizon() {
        let (pool, _dir) = test_pool().await;
        let tenant = insert_tenant(&pool, "acme", 0).await;
        seed_notification(&pool, tenant, "old", 10).await;

        let notifier = Notifier::new(pool.clone(), Arc::new(RecordingEmitter::new()))
            .with_retention_horizon(u64::MAX);
        let err = notifier.prune_expired().await.unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
        assert_eq!(notifier.unread_count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_read() {
        let (pool, _dir) = test_pool().await;
        let tenant = insert_tenant(&pool, "acme", 0).await;
        seed_notification(&pool, tenant, "PR_1", 10).await;
        seed_notification(&pool, tenant, "PR_2", 10).await;

        let notifier = Notifier::new(pool.clone(), Arc::new(RecordingEmitter::new()));
        let unread = notifier
            .list_notifications(Some(tenant), Some(NotificationStatus::Unread))
            .await
            .unwrap();
        assert_eq!(unread.len(), 2);

        notifier.mark_read(unread[0].id).await.unwrap();
        assert_eq!(notifier.unread_count(Some(tenant)).await.unwrap(), 1);
        assert!(notifier.mark_read(9999).await.unwrap_err().is_not_found());

        assert_eq!(notifier.mark_all_read(tenant).await.unwrap(), 1);
        assert_eq!(notifier.unread_count(Some(tenant)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_pass_emits_nothing_but_advances_checkpoint() {
        let (pool, _dir) = test_pool().await;
        let tenant = insert_tenant(&pool, "acme", 0).await;
        let mut conn = pool.acquire().await.unwrap();
        let product = products::create(&mut conn, "Payments", None, r#"["billing"]"#, 10)
            .await
            .unwrap();
        products::link_tenant(&mut conn, product.id, tenant).await.unwrap();
        drop(conn);

        let emitter = Arc::new(RecordingEmitter::new());
        let notifier = Notifier::new(pool.clone(), emitter.clone());

        assert_eq!(notifier.emit_unread_notifications().await.unwrap(), 0);
        assert_eq!(emitter.count(UNREAD_NOTIFICATIONS_EVENT), 0);

        let checkpoint: Option<i64> =
            sqlx::query_scalar("SELECT notified_revision FROM product_tenant_links")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(checkpoint, Some(0));
    }
}
