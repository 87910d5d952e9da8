//! Periodic job runner.
//!
//! Two jobs run on their own ticks:
//! - sync: `sync_all_stale` followed by `emit_unread_notifications`
//! - retention: prune expired notifications
//!
//! A tick that arrives while the same job is still running is skipped.
//! Stopping cancels in-flight jobs (dropping any pending remote call) and
//! waits for them, so `stop` returns promptly.

use crate::error::AppError;
use crate::services::notifier::Notifier;
use crate::services::sync_engine::SyncEngine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Commands accepted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run the sync job now.
    TriggerSync,

    /// Run the retention job now.
    Prune,
}

/// Lightweight handle for a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Request an immediate sync pass.
    pub async fn trigger_sync(&self) -> Result<(), AppError> {
        self.send(SchedulerCommand::TriggerSync).await
    }

    /// Request an immediate retention sweep.
    pub async fn trigger_prune(&self) -> Result<(), AppError> {
        self.send(SchedulerCommand::Prune).await
    }

    async fn send(&self, command: SchedulerCommand) -> Result<(), AppError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| AppError::internal("Scheduler not running"))
    }
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct Scheduler {
    engine: Arc<SyncEngine>,
    notifier: Arc<Notifier>,
    sync_interval: Duration,
    retention_interval: Duration,
    running: Option<Running>,
}

impl Scheduler {
    /// Create a stopped scheduler using the engine's configured intervals.
    pub fn new(engine: Arc<SyncEngine>, notifier: Arc<Notifier>) -> Self {
        let config = engine.config();
        let sync_interval = Duration::from_secs(config.sync_interval_secs);
        let retention_interval = Duration::from_secs(config.retention_interval_secs);

        Self {
            engine,
            notifier,
            sync_interval,
            retention_interval,
            running: None,
        }
    }

    /// Override the tick periods.
    pub fn with_intervals(mut self, sync: Duration, retention: Duration) -> Self {
        self.sync_interval = sync;
        self.retention_interval = retention;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Start ticking. The scheduler also stops when `ctx` is cancelled.
    ///
    /// The first sync tick fires immediately; the first retention tick
    /// fires one retention period after start.
    pub fn start(&mut self, ctx: &CancellationToken) -> Result<SchedulerHandle, AppError> {
        if self.is_running() {
            return Err(AppError::internal("Scheduler already running"));
        }

        let (command_tx, command_rx) = mpsc::channel(16);
        let cancel = ctx.child_token();
        let jobs = Jobs {
            engine: Arc::clone(&self.engine),
            notifier: Arc::clone(&self.notifier),
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(run_loop(
            jobs,
            non_zero(self.sync_interval),
            non_zero(self.retention_interval),
            command_rx,
        ));
        log::info!(
            "[scheduler] Started (sync every {}s, retention every {}s)",
            self.sync_interval.as_secs(),
            self.retention_interval.as_secs()
        );

        self.running = Some(Running { cancel, task });
        Ok(SchedulerHandle { command_tx })
    }

    /// Cancel in-flight jobs and wait for the loop to exit.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.task.await {
            log::error!("[scheduler] Loop task failed: {}", e);
        }
        log::info!("[scheduler] Stopped");
    }
}

/// Tokio intervals panic on a zero period.
fn non_zero(period: Duration) -> Duration {
    period.max(Duration::from_millis(1))
}

struct Jobs {
    engine: Arc<SyncEngine>,
    notifier: Arc<Notifier>,
    cancel: CancellationToken,
}

impl Jobs {
    /// Spawn `job` unless the previous run in `slot` is still going.
    fn spawn<F>(&self, slot: &mut Option<JoinHandle<()>>, name: &'static str, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            log::debug!("[scheduler] Previous {} job still running, skipping tick", name);
            return;
        }

        let cancel = self.cancel.clone();
        *slot = Some(tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("[scheduler] {} job cancelled", name);
                }
                _ = job => {}
            }
        }));
    }

    fn sync(&self, slot: &mut Option<JoinHandle<()>>) {
        let engine = Arc::clone(&self.engine);
        let notifier = Arc::clone(&self.notifier);
        self.spawn(slot, "sync", async move {
            match engine.sync_all_stale().await {
                Ok(result) => log::info!(
                    "[scheduler] Sync pass done: {} synced, {} failed in {}ms",
                    result.tenants_synced,
                    result.tenants_failed,
                    result.duration_ms
                ),
                Err(e) => log::error!("[scheduler] Sync pass error: {}", e),
            }
            if let Err(e) = notifier.emit_unread_notifications().await {
                log::error!("[scheduler] Notification pass error: {}", e);
            }
        });
    }

    fn prune(&self, slot: &mut Option<JoinHandle<()>>) {
        let notifier = Arc::clone(&self.notifier);
        self.spawn(slot, "retention", async move {
            if let Err(e) = notifier.prune_expired().await {
                log::error!("[scheduler] Retention sweep error: {}", e);
            }
        });
    }
}

async fn run_loop(
    jobs: Jobs,
    sync_interval: Duration,
    retention_interval: Duration,
    mut command_rx: mpsc::Receiver<SchedulerCommand>,
) {
    let mut sync_tick = time::interval(sync_interval);
    sync_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut retention_tick = time::interval_at(Instant::now() + retention_interval, retention_interval);
    retention_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut sync_job: Option<JoinHandle<()>> = None;
    let mut prune_job: Option<JoinHandle<()>> = None;

    loop {
        tokio::select! {
            biased;
            _ = jobs.cancel.cancelled() => break,
            _ = sync_tick.tick() => jobs.sync(&mut sync_job),
            _ = retention_tick.tick() => jobs.prune(&mut prune_job),
            Some(command) = command_rx.recv() => match command {
                SchedulerCommand::TriggerSync => {
                    log::info!("[scheduler] Manual sync triggered");
                    jobs.sync(&mut sync_job);
                }
                SchedulerCommand::Prune => {
                    log::info!("[scheduler] Manual retention sweep triggered");
                    jobs.prune(&mut prune_job);
                }
            },
        }
    }

    for job in [sync_job, prune_job].into_iter().flatten() {
        if let Err(e) = job.await {
            log::error!("[scheduler] Job failed: {}", e);
        }
    }
}
