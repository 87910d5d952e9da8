//! Headless host: runs the scheduler until Ctrl-C.

use repo_pulse_lib::config::AppConfig;
use repo_pulse_lib::services::sync_events::LogEmitter;
use repo_pulse_lib::AppContext;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("repo-pulse: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if config.local_dev {
        log::info!("Local development mode, data in {}", config.data_dir.display());
    }

    let context = match AppContext::initialize(config, Arc::new(LogEmitter)).await {
        Ok(context) => context,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let mut scheduler = context.scheduler();
    if let Err(e) = scheduler.start(&shutdown) {
        log::error!("Failed to start scheduler: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
    }
    log::info!("Shutting down");
    shutdown.cancel();
    scheduler.stop().await;
    context.pool.close().await;

    ExitCode::SUCCESS
}
