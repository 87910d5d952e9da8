//! Application configuration sourced from environment variables.
//!
//! `REPO_PULSE_SETTINGS` may point at a JSON file overriding individual
//! [`SyncConfig`] fields; anything it leaves out keeps its default.

use crate::db;
use crate::error::AppError;
use crate::services::github_client::DEFAULT_GRAPHQL_ENDPOINT;
use crate::services::sync_engine::SyncConfig;
use std::path::{Path, PathBuf};

pub const APP_DIR_VAR: &str = "REPO_PULSE_APP_DIR";
pub const LOG_LEVEL_VAR: &str = "REPO_PULSE_LOG_LEVEL";
pub const LOCAL_DEV_VAR: &str = "REPO_PULSE_LOCAL_DEV";
pub const GITHUB_ENDPOINT_VAR: &str = "REPO_PULSE_GITHUB_ENDPOINT";
pub const SETTINGS_VAR: &str = "REPO_PULSE_SETTINGS";

const DEFAULT_APP_DIR_NAME: &str = ".repo-pulse";
const LOCAL_DEV_DIR: &str = ".dev-data";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the database.
    pub data_dir: PathBuf,

    /// Log filter directive.
    pub log_level: String,

    /// Whether the local development data directory is in use.
    pub local_dev: bool,

    /// GraphQL endpoint of the remote platform.
    pub github_endpoint: String,

    pub sync: SyncConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let local_dev = var(LOCAL_DEV_VAR)
            .map(|v| parse_flag(&v))
            .transpose()?
            .unwrap_or(false);

        let data_dir = if local_dev {
            PathBuf::from(LOCAL_DEV_DIR)
        } else if let Some(dir) = var(APP_DIR_VAR) {
            PathBuf::from(dir)
        } else {
            let home = var("HOME").ok_or_else(|| {
                AppError::config(format!("Neither {} nor HOME is set", APP_DIR_VAR))
            })?;
            Path::new(&home).join(DEFAULT_APP_DIR_NAME)
        };

        let sync = match var(SETTINGS_VAR) {
            Some(path) => load_sync_settings(Path::new(&path))?,
            None => SyncConfig::default(),
        };
        if sync.sync_interval_secs == 0 || sync.retention_interval_secs == 0 {
            return Err(AppError::config("Tick intervals must be positive"));
        }
        for (name, secs) in [
            ("staleness_secs", sync.staleness_secs),
            ("retention_horizon_secs", sync.retention_horizon_secs),
        ] {
            if db::seconds_before_now(secs).is_none() {
                return Err(AppError::config(format!("{} is out of range: {}", name, secs)));
            }
        }

        Ok(Self {
            data_dir,
            log_level: var(LOG_LEVEL_VAR).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            local_dev,
            github_endpoint: var(GITHUB_ENDPOINT_VAR)
                .unwrap_or_else(|| DEFAULT_GRAPHQL_ENDPOINT.to_string()),
            sync,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        db::get_db_path(&self.data_dir)
    }
}

fn parse_flag(value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::config(format!(
            "Invalid value for {}: {}",
            LOCAL_DEV_VAR, other
        ))),
    }
}

fn load_sync_settings(path: &Path) -> Result<SyncConfig, AppError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&contents)
        .map_err(|e| AppError::config(format!("Failed to parse {}: {}", path.display(), e)))
}
