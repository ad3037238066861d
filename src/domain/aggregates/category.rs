//! Category Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::Fields;

/// Category document stored at `categories/{slug}`.
///
/// Fields the job does not know about are kept in `extra` and written back
/// untouched, so a merge never drops data an admin added by hand.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryDocument {
    pub name: String,
    pub slug: String,
    pub legacy_keys: Vec<String>,
    pub order: i64,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Fields,
}

/// What the synchronizer did to a canonical category document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome { Created, Updated, Unchanged }

impl CategoryDocument {
    pub fn create(slug: &str, name: &str, legacy_keys: &[String], order: i64, now: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(), slug: slug.to_string(), legacy_keys: legacy_keys.to_vec(),
            order, is_active: true, created_at: Some(now), updated_at: Some(now), extra: Fields::new(),
        }
    }

    /// Lenient read: documents written by old seed scripts may miss most fields.
    pub fn from_fields(fields: &Fields) -> Self {
        serde_json::from_value(serde_json::Value::Object(fields.clone())).unwrap_or_else(|_| Self {
            name: fields.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            order: fields.get("order").and_then(|v| v.as_i64()).unwrap_or_default(),
            ..Self::default()
        })
    }

    pub fn to_fields(&self) -> Fields {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Fields::new(),
        }
    }

    /// True when the display metadata differs from the wanted values.
    pub fn needs_merge(&self, slug: &str, name: &str, legacy_keys: &[String]) -> bool {
        self.name != name || self.slug != slug || self.legacy_keys != legacy_keys
    }

    /// Partial document for an update write. `updatedAt` only moves when
    /// something actually changed, so a repeated merge is a no-op update.
    pub fn merge_patch(&self, slug: &str, name: &str, legacy_keys: &[String], now: DateTime<Utc>) -> Fields {
        let mut patch = Fields::new();
        patch.insert("name".into(), name.into());
        patch.insert("slug".into(), slug.into());
        patch.insert("legacyKeys".into(), legacy_keys.iter().cloned().map(serde_json::Value::from).collect());
        if self.needs_merge(slug, name, legacy_keys) {
            patch.insert("updatedAt".into(), now.to_rfc3339().into());
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: serde_json::Value) -> Fields { v.as_object().cloned().unwrap() }

    #[test]
    fn test_create_round_trips_through_fields() {
        let now = Utc::now();
        let doc = CategoryDocument::create("bags", "가방", &["가방".to_string()], 3, now);
        let f = doc.to_fields();
        assert_eq!(f["isActive"], json!(true));
        assert_eq!(f["legacyKeys"], json!(["가방"]));
        assert_eq!(CategoryDocument::from_fields(&f), doc);
    }

    #[test]
    fn test_lenient_read_keeps_extra_fields() {
        let doc = CategoryDocument::from_fields(&fields(json!({"name": "상의", "banner": "top.png"})));
        assert_eq!(doc.name, "상의");
        assert_eq!(doc.order, 0);
        assert_eq!(doc.extra["banner"], json!("top.png"));

        let odd = CategoryDocument::from_fields(&fields(json!({"name": "신발", "order": 4, "isActive": "yes"})));
        assert_eq!(odd.name, "신발");
        assert_eq!(odd.order, 4);
    }

    #[test]
    fn test_merge_patch_only_touches_timestamp_on_change() {
        let keys = vec!["가방".to_string()];
        let doc = CategoryDocument::create("bags", "가방", &keys, 0, Utc::now());
        assert!(!doc.merge_patch("bags", "가방", &keys, Utc::now()).contains_key("updatedAt"));
        assert!(doc.merge_patch("bags", "Bags", &keys, Utc::now()).contains_key("updatedAt"));
    }
}
