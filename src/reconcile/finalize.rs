//! Orphan/conflict resolver for legacy categories.

use serde::Serialize;
use tracing::{info, warn};

use super::Reconciler;
use crate::domain::value_objects::{CollectionPath, DocumentPath};
use crate::{ReconcileError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FinalizeOutcome {
    pub deleted: bool,
    pub remaining: usize,
}

impl Reconciler {
    /// Deletes the legacy category document once its product subcollection
    /// is empty. While conflicts remain the document stays and `remaining`
    /// says how many products still live under it; nothing is force-deleted.
    pub async fn finalize_legacy_category(&self, legacy_key: &str) -> Result<FinalizeOutcome> {
        if !self.mapping.is_legacy(legacy_key) {
            return Err(ReconcileError::UnknownLegacyKey(legacy_key.to_string()));
        }

        let remaining = self.store.list_documents(&CollectionPath::products(legacy_key)).await?.len();
        if remaining > 0 {
            warn!(legacy_key, remaining, "legacy category still owns products; keeping it");
            return Ok(FinalizeOutcome { deleted: false, remaining });
        }

        let path = DocumentPath::category(legacy_key);
        if self.store.get_document(&path).await?.is_none() {
            return Ok(FinalizeOutcome::default());
        }
        self.store.delete_document(&path).await?;
        info!(legacy_key, "deleted empty legacy category");
        Ok(FinalizeOutcome { deleted: true, remaining: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::super::ReconcileOptions;
    use super::*;
    use crate::store::MemoryStore;
    use crate::{Fields, SlugMappingTable};
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryStore>, Reconciler) {
        let store = Arc::new(MemoryStore::new());
        let mapping = SlugMappingTable::from_json(
            r#"{"version": 1, "categories": [{"slug": "tops", "displayName": "상의", "legacyKeys": ["상의", "top"]}]}"#,
        ).unwrap();
        let r = Reconciler::new(store.clone(), Arc::new(mapping), ReconcileOptions::default());
        (store, r)
    }

    #[tokio::test]
    async fn test_deletes_empty_legacy_category() {
        let (store, r) = setup();
        store.seed(DocumentPath::category("상의"), Fields::new()).await;
        assert_eq!(r.finalize_legacy_category("상의").await.unwrap(), FinalizeOutcome { deleted: true, remaining: 0 });
        assert!(store.document(&DocumentPath::category("상의")).await.is_none());
        assert_eq!(r.finalize_legacy_category("상의").await.unwrap(), FinalizeOutcome::default());
    }

    #[tokio::test]
    async fn test_keeps_category_with_products() {
        let (store, r) = setup();
        store.seed(DocumentPath::category("top"), Fields::new()).await;
        store.seed(DocumentPath::product("top", "P1"), Fields::new()).await;
        assert_eq!(r.finalize_legacy_category("top").await.unwrap(), FinalizeOutcome { deleted: false, remaining: 1 });
        assert!(store.document(&DocumentPath::category("top")).await.is_some());
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_only_legacy_keys_are_accepted() {
        let (store, r) = setup();
        store.seed(DocumentPath::category("tops"), Fields::new()).await;
        assert!(matches!(r.finalize_legacy_category("tops").await, Err(ReconcileError::UnknownLegacyKey(_))));
        assert!(store.document(&DocumentPath::category("tops")).await.is_some());
    }
}
