//! Data models for the application.
//!
//! These models represent the entities stored in the local SQLite database
//! and exchanged with the desktop shell.
//!
//! Row models derive Serialize for IPC and FromRow for SQLx queries.

pub mod credential;
pub mod notification;
pub mod product;
pub mod pull_request;
pub mod repository;
pub mod sync_log;
pub mod tenant;
pub mod vulnerability_alert;

// Re-exports for convenient access
pub use credential::Credential;
pub use notification::{Notification, NotificationStatus, NotificationType, PendingNotification};
pub use product::{NewProduct, Product};
pub use pull_request::{NewPullRequest, PullRequest, PullRequestState};
pub use repository::{NewRepository, Repository};
pub use sync_log::{LogStatus, SyncLog};
pub use tenant::{NewTenant, Tenant, TenantView, UpdateTenant};
pub use vulnerability_alert::{AlertState, NewVulnerabilityAlert, Severity, VulnerabilityAlert};
