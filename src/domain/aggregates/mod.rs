//! Aggregates module
pub mod category;
pub mod product;

pub use category::{CategoryDocument, SyncOutcome};
pub use product::ProductDocument;
