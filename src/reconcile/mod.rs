//! Category reconciliation job.
//!
//! `Reconciler::run` drives the pipeline for one action. Legacy/canonical
//! pairs are processed strictly one after another and every read or commit
//! is awaited before the next step starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::SyncOutcome;
use crate::domain::events::ReconcileEvent;
use crate::mapping::SlugMappingTable;
use crate::store::DocumentStore;
use crate::{ReconcileError, Result};

mod check;
mod finalize;
mod relocate;
mod sync;
mod verify;

pub use check::{CanonicalCategoryState, CatalogSnapshot, LegacyCategoryState};
pub use finalize::FinalizeOutcome;
pub use relocate::RelocationResult;
pub use verify::{CountRegression, VerificationReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action { Check, Migrate, Delete, Verify, All }

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Check => "check",
            Self::Migrate => "migrate",
            Self::Delete => "delete",
            Self::Verify => "verify",
            Self::All => "all",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
#[error("unknown action `{0}` (expected check, migrate, delete, verify or all)")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "check" => Ok(Self::Check),
            "migrate" => Ok(Self::Migrate),
            "delete" => Ok(Self::Delete),
            "verify" => Ok(Self::Verify),
            "all" => Ok(Self::All),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Which side wins when a canonical category document already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayNamePolicy {
    /// The mapping table's display name is merged on every run.
    #[default]
    CanonicalWins,
    /// The name on an existing legacy category document is merged instead.
    LegacyWins,
    /// Never touch a canonical document after it was first created.
    Preserve,
}

#[derive(Debug, Error)]
#[error("unknown display name policy `{0}` (expected canonical-wins, legacy-wins or preserve)")]
pub struct UnknownPolicy(pub String);

impl FromStr for DisplayNamePolicy {
    type Err = UnknownPolicy;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "canonical-wins" | "canonical" => Ok(Self::CanonicalWins),
            "legacy-wins" | "legacy" => Ok(Self::LegacyWins),
            "preserve" | "never" => Ok(Self::Preserve),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReconcileOptions {
    pub display_name_policy: DisplayNamePolicy,
}

#[derive(Clone, Debug, Serialize)]
pub struct CategorySyncReport {
    pub slug: String,
    pub outcome: SyncOutcome,
}

/// Outcome of relocating one legacy key into its canonical slug.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PairReport {
    pub legacy_key: String,
    pub canonical_slug: String,
    pub moved: usize,
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precondition_failure: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct FinalizeReport {
    pub legacy_key: String,
    #[serde(flatten)]
    pub outcome: FinalizeOutcome,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub action: Action,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<CatalogSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategorySyncReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<PairReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub finalized: Vec<FinalizeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub regressions: Vec<CountRegression>,
    #[serde(skip)]
    pub events: Vec<ReconcileEvent>,
}

impl RunReport {
    fn new(action: Action) -> Self {
        Self {
            run_id: Uuid::now_v7(), action, started_at: Utc::now(), finished_at: None, snapshot: None,
            categories: vec![], pairs: vec![], finalized: vec![], verification: None, regressions: vec![], events: vec![],
        }
    }

    pub fn moved(&self) -> usize { self.pairs.iter().map(|p| p.moved).sum() }

    pub fn skipped(&self) -> Vec<&str> {
        self.pairs.iter().flat_map(|p| p.skipped.iter().map(String::as_str)).collect()
    }

    pub fn deleted(&self) -> Vec<&str> {
        self.finalized.iter().filter(|f| f.outcome.deleted).map(|f| f.legacy_key.as_str()).collect()
    }

    /// True when a human has to look at something: skipped conflicts,
    /// product errors, aborted pairs, retained legacy categories, remaining
    /// legacy keys or lost products.
    pub fn needs_attention(&self) -> bool {
        self.pairs.iter().any(|p| !p.skipped.is_empty() || !p.errors.is_empty() || p.precondition_failure.is_some())
            || self.finalized.iter().any(|f| f.outcome.remaining > 0)
            || self.verification.as_ref().is_some_and(|v| !v.is_clean())
            || !self.regressions.is_empty()
    }

    fn raise_event(&mut self, event: ReconcileEvent) { self.events.push(event); }
}

/// A run stopped by a store failure. The partial report shows how far it got;
/// re-invoking the same action is safe.
#[derive(Debug, Error)]
#[error("reconciliation run {} aborted: {source}", .partial.run_id)]
pub struct RunAborted {
    #[source]
    pub source: ReconcileError,
    pub partial: Box<RunReport>,
}

pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    mapping: Arc<SlugMappingTable>,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(store: Arc<dyn DocumentStore>, mapping: Arc<SlugMappingTable>, options: ReconcileOptions) -> Self {
        Self { store, mapping, options }
    }

    pub fn mapping(&self) -> &SlugMappingTable { &self.mapping }

    pub async fn run(&self, action: Action) -> std::result::Result<RunReport, RunAborted> {
        let mut report = RunReport::new(action);
        info!(run_id = %report.run_id, %action, mapping_version = self.mapping.version(), "starting reconciliation run");

        let outcome = self.execute(action, &mut report).await;
        report.finished_at = Some(Utc::now());
        match outcome {
            Ok(()) => {
                info!(
                    run_id = %report.run_id,
                    moved = report.moved(),
                    skipped = report.skipped().len(),
                    deleted = report.deleted().len(),
                    needs_attention = report.needs_attention(),
                    "reconciliation run finished"
                );
                Ok(report)
            }
            Err(source) => {
                error!(run_id = %report.run_id, error = %source, "reconciliation run aborted");
                Err(RunAborted { source, partial: Box::new(report) })
            }
        }
    }

    async fn execute(&self, action: Action, report: &mut RunReport) -> Result<()> {
        match action {
            Action::Check => report.snapshot = Some(self.check().await?),
            Action::Migrate => self.migrate(report).await?,
            Action::Delete => self.finalize_all(report).await?,
            Action::Verify => report.verification = Some(self.verify(&self.mapping.canonical_slugs()).await?),
            Action::All => {
                let snapshot = self.check().await?;
                self.migrate(report).await?;
                self.finalize_all(report).await?;
                let verification = self.verify(&self.mapping.canonical_slugs()).await?;
                report.regressions = verification.regressions(&snapshot);
                for regression in &report.regressions {
                    warn!(scope = %regression.scope, before = regression.before, after = regression.after, "product count dropped");
                }
                report.snapshot = Some(snapshot);
                report.verification = Some(verification);
            }
        }
        Ok(())
    }

    /// Synchronizer then relocator, canonical slug by canonical slug.
    async fn migrate(&self, report: &mut RunReport) -> Result<()> {
        for entry in self.mapping.entries() {
            let outcome = match self.resolve_display_name(entry).await? {
                Some(display_name) => self.ensure_canonical_category(&entry.slug, &display_name).await?,
                None => SyncOutcome::Unchanged,
            };
            report.categories.push(CategorySyncReport { slug: entry.slug.clone(), outcome });
            report.raise_event(ReconcileEvent::CategorySynced { slug: entry.slug.clone(), outcome });

            for legacy_key in &entry.legacy_keys {
                let mut pair = PairReport { legacy_key: legacy_key.clone(), canonical_slug: entry.slug.clone(), ..PairReport::default() };
                match self.relocate_products(legacy_key, &entry.slug).await {
                    Ok(result) => {
                        for product_id in &result.relocated {
                            report.raise_event(ReconcileEvent::ProductRelocated {
                                product_id: product_id.clone(), from: legacy_key.clone(), to: entry.slug.clone(),
                            });
                        }
                        for product_id in &result.skipped {
                            report.raise_event(ReconcileEvent::ConflictSkipped {
                                product_id: product_id.clone(), legacy_key: legacy_key.clone(), canonical_slug: entry.slug.clone(),
                            });
                        }
                        pair.moved = result.moved;
                        pair.skipped = result.skipped;
                        pair.errors = result.errors;
                    }
                    Err(e @ ReconcileError::CanonicalCategoryMissing(_)) => {
                        warn!(legacy_key = %legacy_key, canonical = %entry.slug, error = %e, "skipping pair");
                        pair.precondition_failure = Some(e.to_string());
                    }
                    Err(e) => return Err(e),
                }
                report.pairs.push(pair);
            }
        }
        Ok(())
    }

    async fn finalize_all(&self, report: &mut RunReport) -> Result<()> {
        for (legacy_key, _) in self.mapping.legacy_pairs() {
            let outcome = self.finalize_legacy_category(legacy_key).await?;
            if outcome.deleted {
                report.raise_event(ReconcileEvent::LegacyCategoryDeleted { legacy_key: legacy_key.to_string() });
            } else if outcome.remaining > 0 {
                report.raise_event(ReconcileEvent::LegacyCategoryRetained { legacy_key: legacy_key.to_string(), remaining: outcome.remaining });
            }
            report.finalized.push(FinalizeReport { legacy_key: legacy_key.to_string(), outcome });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        assert_eq!("ALL".parse::<Action>().unwrap(), Action::All);
        assert_eq!(" verify ".parse::<Action>().unwrap(), Action::Verify);
        assert!("purge".parse::<Action>().is_err());
        assert_eq!(Action::Migrate.to_string(), "migrate");
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("legacy-wins".parse::<DisplayNamePolicy>().unwrap(), DisplayNamePolicy::LegacyWins);
        assert_eq!("preserve".parse::<DisplayNamePolicy>().unwrap(), DisplayNamePolicy::Preserve);
        assert_eq!(DisplayNamePolicy::default(), DisplayNamePolicy::CanonicalWins);
        assert!("whatever".parse::<DisplayNamePolicy>().is_err());
    }
}
