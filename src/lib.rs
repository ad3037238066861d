//! OpenSASE Catalog Reconciliation
//!
//! Brings the two-level storefront catalog (`categories/{id}` documents, each
//! owning a `products` subcollection) into its canonical shape after the
//! category key scheme changed from localized keys to stable slugs.
//!
//! ## Pipeline
//! - Slug mapping table (legacy key -> canonical slug + display name)
//! - Category document synchronizer
//! - Product relocator (batched copy-then-delete)
//! - Orphan/conflict resolver
//! - Verification pass
//!
//! Every step reads current state before mutating, so a run can simply be
//! re-invoked after a failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod api;
pub mod config;
pub mod domain;
pub mod mapping;
pub mod reconcile;
pub mod store;
pub mod telemetry;

pub use mapping::{CategoryMapping, MappingError, SlugMappingTable};
pub use reconcile::{Action, DisplayNamePolicy, ReconcileOptions, Reconciler, RunAborted, RunReport};
pub use store::{DocumentStore, StoreError};

// =============================================================================
// Core Types
// =============================================================================

/// Document body: a JSON object keyed by field name.
pub type Fields = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Canonical category `{0}` does not exist")]
    CanonicalCategoryMissing(String),

    #[error("`{0}` is not a known legacy category key")]
    UnknownLegacyKey(String),

    #[error("Legacy key `{legacy_key}` maps to `{expected}`, not `{requested}`")]
    MappingMismatch { legacy_key: String, expected: String, requested: String },

    #[error("`{0}` is a legacy key and cannot be used as a canonical slug")]
    LegacySlug(String),

    #[error("Invalid category mapping: {0}")]
    Mapping(#[from] MappingError),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
