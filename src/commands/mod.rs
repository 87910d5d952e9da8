//! Tauri IPC command handlers.
//!
//! This module contains all commands exposed to the frontend via Tauri's invoke system.
//! Commands are organized by functionality:
//! - `tenants`: tenant registry management
//! - `products`: product catalog and mirrored entity reads
//! - `notifications`: unread notification listing and acknowledgement
//! - `sync`: sync status and manual triggers

pub mod notifications;
pub mod products;
pub mod sync;
pub mod tenants;

pub use notifications::*;
pub use products::*;
pub use sync::*;
pub use tenants::*;
