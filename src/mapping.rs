//! Slug mapping table: legacy category keys -> canonical slug and display name.
//!
//! The table is a versioned JSON resource rather than code, so a new legacy
//! key can be added by editing `config/category_map.json` (or pointing
//! `CATEGORY_MAP_PATH` at another file) without a redeploy. Keys that are
//! neither legacy nor canonical are never acted on.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::value_objects::{is_valid_segment, CategorySlug, SlugError};

const BUILTIN_MAP: &str = include_str!("../config/category_map.json");

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMapping {
    pub slug: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default)]
    pub legacy_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    version: u32,
    categories: Vec<CategoryMapping>,
}

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("failed to read mapping file {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse mapping: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid canonical slug `{slug}`: {reason}")]
    InvalidSlug { slug: String, reason: SlugError },

    #[error("canonical slug `{0}` is listed more than once")]
    DuplicateSlug(String),

    #[error("category `{0}` has an empty display name")]
    EmptyDisplayName(String),

    #[error("category `{slug}` has an invalid legacy key `{key}`")]
    InvalidLegacyKey { slug: String, key: String },

    #[error("canonical slug `{0}` is also listed as a legacy key")]
    SlugListedAsLegacy(String),

    #[error("legacy key `{key}` is mapped to both `{first}` and `{second}`")]
    LegacyKeyMappedTwice { key: String, first: String, second: String },
}

#[derive(Clone, Debug)]
pub struct SlugMappingTable {
    version: u32,
    entries: Vec<CategoryMapping>,
    by_legacy: HashMap<String, usize>,
    by_slug: HashMap<String, usize>,
}

impl SlugMappingTable {
    /// Validates and indexes the entries. Nothing is guessed: any ambiguity
    /// is a load error.
    pub fn new(version: u32, entries: Vec<CategoryMapping>) -> Result<Self, MappingError> {
        let mut by_slug = HashMap::new();
        let mut by_legacy: HashMap<String, usize> = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            let slug = CategorySlug::new(entry.slug.as_str())
                .map_err(|reason| MappingError::InvalidSlug { slug: entry.slug.clone(), reason })?;
            if slug.as_str() != entry.slug {
                return Err(MappingError::InvalidSlug { slug: entry.slug.clone(), reason: SlugError::InvalidCharacter });
            }
            if entry.display_name.trim().is_empty() {
                return Err(MappingError::EmptyDisplayName(entry.slug.clone()));
            }
            if by_slug.insert(entry.slug.clone(), idx).is_some() {
                return Err(MappingError::DuplicateSlug(entry.slug.clone()));
            }
            for key in &entry.legacy_keys {
                if !is_valid_segment(key) || key.trim() != key {
                    return Err(MappingError::InvalidLegacyKey { slug: entry.slug.clone(), key: key.clone() });
                }
                if let Some(&first) = by_legacy.get(key) {
                    return Err(MappingError::LegacyKeyMappedTwice {
                        key: key.clone(),
                        first: entries[first].slug.clone(),
                        second: entry.slug.clone(),
                    });
                }
                by_legacy.insert(key.clone(), idx);
            }
        }

        if let Some(slug) = by_slug.keys().find(|slug| by_legacy.contains_key(*slug)) {
            return Err(MappingError::SlugListedAsLegacy(slug.clone()));
        }

        Ok(Self { version, entries, by_legacy, by_slug })
    }

    /// Table shipped with the binary.
    pub fn builtin() -> Result<Self, MappingError> { Self::from_json(BUILTIN_MAP) }

    pub fn from_json(raw: &str) -> Result<Self, MappingError> {
        let file: MappingFile = serde_json::from_str(raw)?;
        Self::new(file.version, file.categories)
    }

    pub fn load(path: &Path) -> Result<Self, MappingError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| MappingError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&raw)
    }

    pub fn version(&self) -> u32 { self.version }
    pub fn entries(&self) -> &[CategoryMapping] { &self.entries }

    /// Canonical entry a legacy key maps to.
    pub fn resolve(&self, legacy_key: &str) -> Option<&CategoryMapping> {
        self.by_legacy.get(legacy_key).map(|&idx| &self.entries[idx])
    }

    pub fn canonical(&self, slug: &str) -> Option<&CategoryMapping> {
        self.by_slug.get(slug).map(|&idx| &self.entries[idx])
    }

    pub fn is_legacy(&self, key: &str) -> bool { self.by_legacy.contains_key(key) }
    pub fn is_canonical(&self, key: &str) -> bool { self.by_slug.contains_key(key) }

    pub fn canonical_slugs(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.slug.clone()).collect()
    }

    /// `(legacy key, canonical entry)` pairs in table order.
    pub fn legacy_pairs(&self) -> impl Iterator<Item = (&str, &CategoryMapping)> {
        self.entries.iter().flat_map(|e| e.legacy_keys.iter().map(move |k| (k.as_str(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(slug: &str, keys: &[&str]) -> CategoryMapping {
        CategoryMapping {
            slug: slug.into(),
            display_name: slug.to_uppercase(),
            order: None,
            legacy_keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_builtin_table_is_valid() {
        let table = SlugMappingTable::builtin().unwrap();
        assert_eq!(table.resolve("가방").map(|e| e.slug.as_str()), Some("bags"));
        assert_eq!(table.resolve("상의").map(|e| e.slug.as_str()), Some("tops"));
        assert!(table.is_canonical("bags"));
        assert!(!table.is_legacy("bags"));
        assert!(table.resolve("sale").is_none());
    }

    #[test]
    fn test_legacy_pairs_in_table_order() {
        let table = SlugMappingTable::new(1, vec![entry("bags", &["가방", "bag"]), entry("tops", &["상의"])]).unwrap();
        let pairs: Vec<_> = table.legacy_pairs().map(|(k, e)| (k, e.slug.as_str())).collect();
        assert_eq!(pairs, vec![("가방", "bags"), ("bag", "bags"), ("상의", "tops")]);
    }

    #[test]
    fn test_rejects_slug_listed_as_legacy() {
        let err = SlugMappingTable::new(1, vec![entry("bags", &["가방"]), entry("tops", &["bags"])]).unwrap_err();
        assert!(matches!(err, MappingError::SlugListedAsLegacy(s) if s == "bags"));
    }

    #[test]
    fn test_rejects_key_mapped_twice() {
        let err = SlugMappingTable::new(1, vec![entry("bags", &["가방"]), entry("pouches", &["가방"])]).unwrap_err();
        assert!(matches!(err, MappingError::LegacyKeyMappedTwice { ref key, .. } if key == "가방"));
    }

    #[test]
    fn test_rejects_bad_slugs_and_keys() {
        assert!(matches!(SlugMappingTable::new(1, vec![entry("Bags", &[])]), Err(MappingError::InvalidSlug { .. })));
        assert!(matches!(SlugMappingTable::new(1, vec![entry("bags", &[]), entry("bags", &[])]), Err(MappingError::DuplicateSlug(_))));
        assert!(matches!(SlugMappingTable::new(1, vec![entry("bags", &["a/b"])]), Err(MappingError::InvalidLegacyKey { .. })));
        let mut nameless = entry("bags", &[]);
        nameless.display_name = " ".into();
        assert!(matches!(SlugMappingTable::new(1, vec![nameless]), Err(MappingError::EmptyDisplayName(_))));
    }

    #[test]
    fn test_from_json() {
        let table = SlugMappingTable::from_json(
            r#"{"version": 7, "categories": [{"slug": "shoes", "displayName": "신발", "legacyKeys": ["신발"]}]}"#,
        ).unwrap();
        assert_eq!(table.version(), 7);
        assert_eq!(table.canonical("shoes").map(|e| e.display_name.as_str()), Some("신발"));
        assert!(matches!(SlugMappingTable::from_json("{"), Err(MappingError::Parse(_))));
    }
}
