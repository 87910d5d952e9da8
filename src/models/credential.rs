//! Tenant credential wrapper.

use serde::Deserialize;
use std::fmt;

/// Bearer credential for one tenant.
///
/// Formatting never reveals the secret; call [`Credential::expose`] at the
/// single place the value is put on the wire.
#[derive(Clone, PartialEq, Eq, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([redacted])")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatting_redacts_secret() {
        let credential = Credential::new("ghp_supersecret");
        assert_eq!(format!("{}", credential), "[redacted]");
        assert!(!format!("{:?}", credential).contains("supersecret"));
        assert_eq!(credential.expose(), "ghp_supersecret");
    }

    #[test]
    fn test_deserializes_from_plain_string() {
        let credential: Credential = serde_json::from_str("\"token\"").unwrap();
        assert_eq!(credential.expose(), "token");
        assert!(!credential.is_empty());
        assert!(Credential::new("  ").is_empty());
    }
}
