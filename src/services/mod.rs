//! Business logic services.
//!
//! This module contains the remote client, the tenant registry and product
//! catalog, the sync engine, the change notifier and the scheduler that
//! drives them.
//!
//! Services are designed to be testable and independent of Tauri-specific code.

pub mod catalog;
pub mod github_client;
pub mod notifier;
pub mod scheduler;
pub mod sync_engine;
pub mod sync_events;
pub mod tenant_registry;

pub use github_client::{GitHubClient, RemoteClient};
pub use notifier::Notifier;
pub use scheduler::{Scheduler, SchedulerHandle};
pub use sync_engine::{SyncConfig, SyncEngine};
pub use sync_events::EventEmitter;
