//! Product relocator: copy-then-delete from a legacy key to its canonical slug.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::Reconciler;
use crate::domain::aggregates::ProductDocument;
use crate::domain::value_objects::{CollectionPath, DocumentPath};
use crate::store::BatchWriter;
use crate::{ReconcileError, Result};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RelocationResult {
    pub moved: usize,
    /// Ids copied to the canonical category and removed from the legacy one.
    pub relocated: Vec<String>,
    /// Ids already present at the destination; both copies are kept.
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
    pub commits: usize,
}

impl Reconciler {
    /// Moves every product under `categories/{legacy_key}/products` to
    /// `categories/{canonical_slug}/products`.
    ///
    /// A product whose id already exists at the destination is a conflict: it
    /// is reported in `skipped` and its legacy copy is left in place. Copies
    /// and deletes are committed in batches bounded by the store limit; each
    /// copy rides in the same atomic batch as, and ahead of, its delete.
    pub async fn relocate_products(&self, legacy_key: &str, canonical_slug: &str) -> Result<RelocationResult> {
        let entry = self
            .mapping
            .resolve(legacy_key)
            .ok_or_else(|| ReconcileError::UnknownLegacyKey(legacy_key.to_string()))?;
        if entry.slug != canonical_slug {
            return Err(ReconcileError::MappingMismatch {
                legacy_key: legacy_key.to_string(),
                expected: entry.slug.clone(),
                requested: canonical_slug.to_string(),
            });
        }
        if self.store.get_document(&DocumentPath::category(canonical_slug)).await?.is_none() {
            return Err(ReconcileError::CanonicalCategoryMissing(canonical_slug.to_string()));
        }

        let products = self.store.list_documents(&CollectionPath::products(legacy_key)).await?;
        let mut result = RelocationResult::default();
        if products.is_empty() {
            debug!(legacy_key, canonical = canonical_slug, "no products left under legacy key");
            return Ok(result);
        }

        let relocated_at = Utc::now();
        let mut writer = BatchWriter::new(self.store.as_ref());
        for doc in products {
            let product = ProductDocument::from(doc);
            if !product.has_consistent_id() {
                warn!(legacy_key, product_id = product.id(), declared = ?product.declared_id(), "product id field disagrees with document id");
                result.errors.push(format!("{}: stored id {:?} does not match document id", product.id(), product.declared_id()));
                continue;
            }

            let destination = DocumentPath::product(canonical_slug, product.id());
            if self.store.get_document(&destination).await?.is_some() {
                warn!(legacy_key, canonical = canonical_slug, product_id = product.id(), "product already exists at destination; leaving legacy copy");
                result.skipped.push(product.id().to_string());
                continue;
            }

            let source = DocumentPath::product(legacy_key, product.id());
            writer.relocate(source, destination, product.relocated_to(canonical_slug, relocated_at)).await?;
            result.relocated.push(product.id().to_string());
        }
        writer.flush().await?;

        result.moved = result.relocated.len();
        result.commits = writer.commits();
        info!(
            legacy_key,
            canonical = canonical_slug,
            moved = result.moved,
            skipped = result.skipped.len(),
            errors = result.errors.len(),
            commits = result.commits,
            "relocated products"
        );
        Ok(result)
    }
}
