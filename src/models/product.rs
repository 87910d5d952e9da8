//! Product model: a named grouping of repositories identified by topic tags.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A product row.
///
/// Note: `tags` is stored as a JSON array in a nullable text column and
/// parsed on demand with [`Product::tags_vec`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,

    /// JSON array of topic tags.
    pub tags: Option<String>,

    pub created_at: i64,

    /// Unix timestamp of the last update or successful sync pass.
    pub updated_at: i64,
}

impl Product {
    /// Parse tags from the JSON column. Malformed or missing tags yield an empty list.
    pub fn tags_vec(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

/// Data required to create or update a product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Tenant to associate the product with.
    #[serde(default)]
    pub tenant_id: Option<i64>,
}

/// Trim tags and drop empty or duplicate entries, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product_with_tags(tags: Option<&str>) -> Product {
        Product {
            id: 1,
            name: "Payments".to_string(),
            description: None,
            tags: tags.map(String::from),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_tags_vec() {
        assert_eq!(
            product_with_tags(Some(r#"["billing","ledger"]"#)).tags_vec(),
            vec!["billing", "ledger"]
        );
        assert!(product_with_tags(None).tags_vec().is_empty());
        assert!(product_with_tags(Some("not json")).tags_vec().is_empty());
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " billing ".to_string(),
            "".to_string(),
            "ledger".to_string(),
            "billing".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["billing", "ledger"]);
    }
}
