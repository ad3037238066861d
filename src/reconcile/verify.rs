//! Verification pass: the success criterion of a run.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{CatalogSnapshot, Reconciler};
use crate::domain::value_objects::CollectionPath;
use crate::Result;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VerificationReport {
    pub per_category_count: BTreeMap<String, usize>,
    /// Category documents whose id is still a legacy key.
    pub remaining_legacy_keys: Vec<String>,
    /// Legacy keys that still own products (unresolved conflicts).
    pub stranded_products: BTreeMap<String, usize>,
    /// Category documents the mapping knows nothing about; reported, never touched.
    pub unmapped_categories: Vec<String>,
    pub total_products: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CountRegression {
    pub scope: String,
    pub before: usize,
    pub after: usize,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.remaining_legacy_keys.is_empty() && self.stranded_products.is_empty()
    }

    /// Canonical categories whose count dropped since `snapshot`, plus a
    /// `total` entry when products went missing overall.
    pub fn regressions(&self, snapshot: &CatalogSnapshot) -> Vec<CountRegression> {
        let mut regressions: Vec<CountRegression> = snapshot
            .canonical
            .iter()
            .filter_map(|(slug, before)| {
                let after = *self.per_category_count.get(slug)?;
                (after < before.product_count).then(|| CountRegression { scope: slug.clone(), before: before.product_count, after })
            })
            .collect();
        if self.total_products < snapshot.total_products() {
            regressions.push(CountRegression { scope: "total".into(), before: snapshot.total_products(), after: self.total_products });
        }
        regressions
    }
}

impl Reconciler {
    pub async fn verify(&self, canonical_slugs: &[String]) -> Result<VerificationReport> {
        let mut report = VerificationReport::default();
        for slug in canonical_slugs {
            let count = self.store.list_documents(&CollectionPath::products(slug)).await?.len();
            report.per_category_count.insert(slug.clone(), count);
        }

        for doc in self.store.list_documents(&CollectionPath::categories()).await? {
            if self.mapping.is_legacy(&doc.id) {
                report.remaining_legacy_keys.push(doc.id);
            } else if !self.mapping.is_canonical(&doc.id) {
                report.unmapped_categories.push(doc.id);
            }
        }

        for (legacy_key, _) in self.mapping.legacy_pairs() {
            let count = self.store.list_documents(&CollectionPath::products(legacy_key)).await?.len();
            if count > 0 {
                report.stranded_products.insert(legacy_key.to_string(), count);
            }
        }

        report.total_products = report.per_category_count.values().sum::<usize>() + report.stranded_products.values().sum::<usize>();
        if report.is_clean() {
            info!(categories = report.per_category_count.len(), total_products = report.total_products, "verification clean");
        } else {
            warn!(
                remaining_legacy_keys = ?report.remaining_legacy_keys,
                stranded = ?report.stranded_products,
                "verification found legacy data needing follow-up"
            );
        }
        Ok(report)
    }
}
