//! Document store port and its adapters.
//!
//! The reconciler only ever talks to [`DocumentStore`]; the hosted document
//! database, the PostgreSQL-backed adapter and the in-memory test store all
//! sit behind it.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::domain::value_objects::{CollectionPath, DocumentPath};
use crate::{Document, Fields};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// Historical per-batch limit of the catalog store.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 400;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Document {0} is not a JSON object")]
    NotAnObject(String),

    #[error("Batch of {size} entries exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Batch commit failed: {0}")]
    CommitFailed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum BatchOp {
    Set { path: DocumentPath, fields: Fields },
    Update { path: DocumentPath, fields: Fields },
    Delete { path: DocumentPath },
}

/// Write operations committed atomically by [`DocumentStore::commit_batch`].
///
/// The size limit counts entries, not raw operations: a relocation puts the
/// destination copy and the source delete into the batch as one entry, copy
/// first, so the delete can never be committed without its copy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
    entries: usize,
}

impl WriteBatch {
    pub fn new() -> Self { Self::default() }

    #[cfg(test)]
    pub(crate) fn set(&mut self, path: DocumentPath, fields: Fields) {
        self.ops.push(BatchOp::Set { path, fields });
        self.entries += 1;
    }

    #[cfg(test)]
    pub(crate) fn delete(&mut self, path: DocumentPath) {
        self.ops.push(BatchOp::Delete { path });
        self.entries += 1;
    }

    pub fn relocate(&mut self, from: DocumentPath, to: DocumentPath, fields: Fields) {
        self.ops.push(BatchOp::Set { path: to, fields });
        self.ops.push(BatchOp::Delete { path: from });
        self.entries += 1;
    }

    pub fn len(&self) -> usize { self.entries }
    pub fn is_empty(&self) -> bool { self.entries == 0 }
    pub fn ops(&self) -> &[BatchOp] { &self.ops }
    pub fn into_ops(self) -> Vec<BatchOp> { self.ops }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents directly under `collection`, ordered by id.
    async fn list_documents(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError>;

    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Fields>, StoreError>;

    /// Replaces the whole document (creates it when absent).
    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError>;

    /// Shallow-merges `partial` into the document (creates it when absent).
    async fn update_document(&self, path: &DocumentPath, partial: Fields) -> Result<(), StoreError>;

    /// Deleting an absent document is not an error. Subcollections are left alone.
    async fn delete_document(&self, path: &DocumentPath) -> Result<(), StoreError>;

    /// All-or-nothing commit; fails with `BatchTooLarge` above `max_batch_size`.
    async fn commit_batch(&self, batch: WriteBatch) -> Result<(), StoreError>;

    fn max_batch_size(&self) -> usize;
}

/// Accumulates writes and commits each time the store's batch limit is
/// reached. Every commit is awaited before more entries are accepted.
pub struct BatchWriter<'a> {
    store: &'a dyn DocumentStore,
    batch: WriteBatch,
    limit: usize,
    commits: usize,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store, batch: WriteBatch::new(), limit: store.max_batch_size().max(1), commits: 0 }
    }

    pub async fn relocate(&mut self, from: DocumentPath, to: DocumentPath, fields: Fields) -> Result<(), StoreError> {
        self.batch.relocate(from, to, fields);
        if self.batch.len() >= self.limit {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), StoreError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        let entries = batch.len();
        self.store.commit_batch(batch).await?;
        self.commits += 1;
        debug!(entries, commit = self.commits, "committed write batch");
        Ok(())
    }

    pub fn commits(&self) -> usize { self.commits }
}
