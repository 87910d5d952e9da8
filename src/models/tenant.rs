//! Tenant (tracked remote organisation) model.

use super::credential::Credential;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked remote owner/organisation.
///
/// The credential is deliberately absent; it is only read through
/// [`TenantView`] during a sync pass.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    /// Local database ID.
    pub id: i64,

    /// Display name.
    pub friendly_name: String,

    /// Remote owner identifier (unique).
    pub namespace: String,

    pub description: Option<String>,

    /// Whether this is the default tenant. At most one tenant has this set.
    pub is_default: bool,

    /// Unix timestamp of creation.
    pub created_at: i64,

    /// Unix timestamp of the last update or successful sync pass.
    pub updated_at: i64,
}

/// Tenant data needed by a sync pass, including the credential.
#[derive(Debug, Clone, FromRow)]
pub struct TenantView {
    pub id: i64,
    pub friendly_name: String,
    pub namespace: String,
    pub credential: Credential,
}

/// Data required to create a tenant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTenant {
    pub friendly_name: String,
    pub namespace: String,
    pub credential: Credential,
    #[serde(default)]
    pub description: Option<String>,
    /// Make the new tenant the default one.
    #[serde(default)]
    pub is_default: bool,
}

/// Data for updating a tenant. `None` leaves the credential and the default
/// flag unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenant {
    pub friendly_name: String,
    pub namespace: String,
    #[serde(default)]
    pub credential: Option<Credential>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

impl NewTenant {
    /// Trim the namespace the way the remote expects it.
    pub fn normalize_namespace(namespace: &str) -> String {
        namespace.trim().trim_matches('/').to_string()
    }
}
