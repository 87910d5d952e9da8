//! Dependency vulnerability alert model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// State of a vulnerability alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
    Open,
    Fixed,
    Dismissed,
    AutoDismissed,
}

impl From<&str> for AlertState {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "FIXED" => Self::Fixed,
            "DISMISSED" => Self::Dismissed,
            "AUTO_DISMISSED" => Self::AutoDismissed,
            _ => Self::Open,
        }
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Fixed => write!(f, "FIXED"),
            Self::Dismissed => write!(f, "DISMISSED"),
            Self::AutoDismissed => write!(f, "AUTO_DISMISSED"),
        }
    }
}

/// Advisory severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl From<&str> for Severity {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "CRITICAL" => Self::Critical,
            "HIGH" => Self::High,
            "MODERATE" | "MEDIUM" => Self::Moderate,
            _ => Self::Low,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A vulnerability alert row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityAlert {
    pub id: i64,

    /// Remote-assigned ID (unique).
    pub external_id: String,

    pub repository_name: String,
    pub package_name: String,

    /// `OPEN`, `FIXED`, `DISMISSED` or `AUTO_DISMISSED`.
    pub state: String,

    /// `LOW`, `MODERATE`, `HIGH` or `CRITICAL`.
    pub severity: String,

    /// First patched version, when the advisory has one.
    pub patched_version: Option<String>,

    pub fixed_at: Option<i64>,
    pub remote_created_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl VulnerabilityAlert {
    pub fn state_enum(&self) -> AlertState {
        AlertState::from(self.state.as_str())
    }

    pub fn severity_enum(&self) -> Severity {
        Severity::from(self.severity.as_str())
    }
}

/// Fields written by a vulnerability alert upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVulnerabilityAlert {
    pub external_id: String,
    pub repository_name: String,
    pub package_name: String,
    pub state: AlertState,
    pub severity: Severity,
    pub patched_version: Option<String>,
    pub fixed_at: Option<i64>,
    pub remote_created_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_state_round_trips_through_strings() {
        for state in [
            AlertState::Open,
            AlertState::Fixed,
            AlertState::Dismissed,
            AlertState::AutoDismissed,
        ] {
            assert_eq!(AlertState::from(state.to_string().as_str()), state);
        }
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!(Severity::from("critical"), Severity::Critical);
        assert_eq!(Severity::from("MODERATE"), Severity::Moderate);
        assert_eq!(Severity::from("medium"), Severity::Moderate);
        assert_eq!(Severity::from("???"), Severity::Low);
        assert!(Severity::Critical > Severity::High);
    }
}
