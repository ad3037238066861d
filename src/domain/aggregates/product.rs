//! Product Aggregate

use chrono::{DateTime, Utc};
use crate::{Document, Fields};

pub const FIELD_ID: &str = "id";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_UPDATED_AT: &str = "updatedAt";

/// Product document living under `categories/{category}/products/{id}`.
///
/// Only the identifier and the embedded category reference matter here;
/// every other catalog field (name, price, images, stock, rating...) is
/// carried through a relocation as-is.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductDocument {
    id: String,
    fields: Fields,
}

impl From<Document> for ProductDocument {
    fn from(doc: Document) -> Self { Self { id: doc.id, fields: doc.fields } }
}

impl ProductDocument {
    pub fn id(&self) -> &str { &self.id }
    pub fn declared_id(&self) -> Option<&str> { self.fields.get(FIELD_ID).and_then(|v| v.as_str()) }

    /// Product ids are immutable: a stored `id` field must match the document id.
    pub fn has_consistent_id(&self) -> bool {
        match self.fields.get(FIELD_ID) {
            None | Some(serde_json::Value::Null) => true,
            Some(_) => self.declared_id() == Some(self.id.as_str()),
        }
    }

    /// Fields for the canonical copy: category reference rewritten, `id`
    /// pinned to the document id, `updatedAt` set to the relocation time.
    pub fn relocated_to(&self, canonical_slug: &str, at: DateTime<Utc>) -> Fields {
        let mut fields = self.fields.clone();
        fields.insert(FIELD_ID.into(), self.id.clone().into());
        fields.insert(FIELD_CATEGORY.into(), canonical_slug.into());
        fields.insert(FIELD_UPDATED_AT.into(), at.to_rfc3339().into());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(id: &str, v: serde_json::Value) -> ProductDocument {
        Document { id: id.into(), fields: v.as_object().cloned().unwrap() }.into()
    }

    #[test]
    fn test_relocated_fields() {
        let p = product("P1", json!({"name": "토트백", "price": 39000, "category": "가방"}));
        let at = Utc::now();
        let f = p.relocated_to("bags", at);
        assert_eq!(f["category"], json!("bags"));
        assert_eq!(f["id"], json!("P1"));
        assert_eq!(f["price"], json!(39000));
        assert_eq!(f["updatedAt"], json!(at.to_rfc3339()));
        assert_eq!(p.id(), "P1");
    }

    #[test]
    fn test_id_consistency() {
        assert!(product("P1", json!({})).has_consistent_id());
        assert!(product("P1", json!({"id": "P1"})).has_consistent_id());
        assert!(product("P1", json!({"id": null})).has_consistent_id());
        assert!(!product("P1", json!({"id": "P9"})).has_consistent_id());
        assert!(!product("P1", json!({"id": 1})).has_consistent_id());
    }
}
