//! Read-only survey of the catalog before a run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::Reconciler;
use crate::domain::value_objects::{CollectionPath, DocumentPath};
use crate::Result;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegacyCategoryState {
    pub legacy_key: String,
    pub canonical_slug: String,
    pub document_exists: bool,
    pub product_count: usize,
    /// Ids that also exist under the canonical slug and would be skipped.
    pub conflicts: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CanonicalCategoryState {
    pub document_exists: bool,
    pub product_count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct CatalogSnapshot {
    pub taken_at: DateTime<Utc>,
    pub legacy: Vec<LegacyCategoryState>,
    pub canonical: BTreeMap<String, CanonicalCategoryState>,
}

impl CatalogSnapshot {
    /// Products under every mapped key, legacy and canonical.
    pub fn total_products(&self) -> usize {
        self.legacy.iter().map(|l| l.product_count).sum::<usize>()
            + self.canonical.values().map(|c| c.product_count).sum::<usize>()
    }

    /// Relocations a migrate would perform right now.
    pub fn pending_moves(&self) -> usize {
        self.legacy.iter().map(|l| l.product_count - l.conflicts.len()).sum()
    }

    pub fn legacy_state(&self, legacy_key: &str) -> Option<&LegacyCategoryState> {
        self.legacy.iter().find(|l| l.legacy_key == legacy_key)
    }
}

impl Reconciler {
    pub async fn check(&self) -> Result<CatalogSnapshot> {
        let mut canonical = BTreeMap::new();
        let mut canonical_ids: BTreeMap<&str, HashSet<String>> = BTreeMap::new();
        for entry in self.mapping.entries() {
            let products = self.store.list_documents(&CollectionPath::products(&entry.slug)).await?;
            let document_exists = self.store.get_document(&DocumentPath::category(&entry.slug)).await?.is_some();
            canonical.insert(entry.slug.clone(), CanonicalCategoryState { document_exists, product_count: products.len() });
            canonical_ids.insert(entry.slug.as_str(), products.into_iter().map(|d| d.id).collect());
        }

        let mut legacy = Vec::new();
        for (legacy_key, entry) in self.mapping.legacy_pairs() {
            let products = self.store.list_documents(&CollectionPath::products(legacy_key)).await?;
            let document_exists = self.store.get_document(&DocumentPath::category(legacy_key)).await?.is_some();
            // Ids moved by an earlier legacy key of the same slug are taken too.
            let taken = canonical_ids.entry(entry.slug.as_str()).or_default();
            let conflicts: Vec<String> = products.iter().filter(|d| taken.contains(&d.id)).map(|d| d.id.clone()).collect();
            taken.extend(products.iter().map(|d| d.id.clone()));
            legacy.push(LegacyCategoryState {
                legacy_key: legacy_key.to_string(),
                canonical_slug: entry.slug.clone(),
                document_exists,
                product_count: products.len(),
                conflicts,
            });
        }

        let snapshot = CatalogSnapshot { taken_at: Utc::now(), legacy, canonical };
        tracing::info!(
            total_products = snapshot.total_products(),
            pending_moves = snapshot.pending_moves(),
            "catalog snapshot taken"
        );
        Ok(snapshot)
    }
}
