//! Category document synchronizer.

use chrono::Utc;
use tracing::{debug, info};

use super::{DisplayNamePolicy, Reconciler};
use crate::domain::aggregates::{CategoryDocument, SyncOutcome};
use crate::domain::value_objects::{CategorySlug, CollectionPath, DocumentPath, SlugError};
use crate::mapping::{CategoryMapping, MappingError};
use crate::{ReconcileError, Result};

impl Reconciler {
    /// Makes sure exactly one category document exists at `canonical_slug`.
    ///
    /// Creates it when absent (one `set`), otherwise merges display metadata
    /// according to the display-name policy (one `update`, or nothing under
    /// `Preserve`). The document id is never changed.
    pub async fn ensure_canonical_category(&self, canonical_slug: &str, display_name: &str) -> Result<SyncOutcome> {
        let slug = CategorySlug::new(canonical_slug)
            .map_err(|reason| MappingError::InvalidSlug { slug: canonical_slug.to_string(), reason })?;
        if slug.as_str() != canonical_slug {
            return Err(MappingError::InvalidSlug { slug: canonical_slug.to_string(), reason: SlugError::InvalidCharacter }.into());
        }
        if self.mapping.is_legacy(canonical_slug) {
            return Err(ReconcileError::LegacySlug(canonical_slug.to_string()));
        }

        let entry = self.mapping.canonical(canonical_slug);
        let legacy_keys = entry.map(|e| e.legacy_keys.clone()).unwrap_or_default();
        let path = DocumentPath::category(canonical_slug);
        let now = Utc::now();

        let Some(fields) = self.store.get_document(&path).await? else {
            let order = match entry.and_then(|e| e.order) {
                Some(order) => order,
                None => self.next_category_order().await?,
            };
            let doc = CategoryDocument::create(canonical_slug, display_name, &legacy_keys, order, now);
            self.store.set_document(&path, doc.to_fields()).await?;
            info!(slug = canonical_slug, name = display_name, order, "created canonical category");
            return Ok(SyncOutcome::Created);
        };

        if self.options.display_name_policy == DisplayNamePolicy::Preserve {
            debug!(slug = canonical_slug, "canonical category exists; preserving its metadata");
            return Ok(SyncOutcome::Unchanged);
        }

        let existing = CategoryDocument::from_fields(&fields);
        let changed = existing.needs_merge(canonical_slug, display_name, &legacy_keys);
        self.store.update_document(&path, existing.merge_patch(canonical_slug, display_name, &legacy_keys, now)).await?;
        if changed {
            info!(slug = canonical_slug, from = %existing.name, to = display_name, "merged canonical category metadata");
            Ok(SyncOutcome::Updated)
        } else {
            debug!(slug = canonical_slug, "canonical category already in sync");
            Ok(SyncOutcome::Unchanged)
        }
    }

    /// Display name to sync for `entry`. Under `LegacyWins` the first legacy
    /// category document with a non-empty name supplies it. Once the legacy
    /// documents are gone an existing canonical name is kept as is, so `None`
    /// means "leave the canonical document alone".
    pub(crate) async fn resolve_display_name(&self, entry: &CategoryMapping) -> Result<Option<String>> {
        if self.options.display_name_policy == DisplayNamePolicy::LegacyWins {
            for key in &entry.legacy_keys {
                if let Some(fields) = self.store.get_document(&DocumentPath::category(key)).await? {
                    let legacy = CategoryDocument::from_fields(&fields);
                    if !legacy.name.trim().is_empty() {
                        return Ok(Some(legacy.name));
                    }
                }
            }
            if self.store.get_document(&DocumentPath::category(&entry.slug)).await?.is_some() {
                debug!(slug = %entry.slug, "no legacy name left; keeping canonical name");
                return Ok(None);
            }
        }
        Ok(Some(entry.display_name.clone()))
    }

    /// Position after the last existing category.
    async fn next_category_order(&self) -> Result<i64> {
        let categories = self.store.list_documents(&CollectionPath::categories()).await?;
        Ok(categories
            .iter()
            .map(|doc| CategoryDocument::from_fields(&doc.fields).order)
            .max()
            .map_or(0, |max| max + 1))
    }
}
