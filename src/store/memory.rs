//! In-memory document store.
//!
//! Keeps collections in ordered maps and records every committed batch, so
//! tests can assert on commit boundaries. `fail_commit` injects a failure
//! into a later commit to exercise crash-and-rerun behavior.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::{Mutex, RwLock};

use super::{BatchOp, DocumentStore, StoreError, WriteBatch, DEFAULT_MAX_BATCH_SIZE};
use crate::domain::value_objects::{CollectionPath, DocumentPath};
use crate::{Document, Fields};

type Collections = BTreeMap<String, BTreeMap<String, Fields>>;

/// Shape of one successful `commit_batch` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommittedBatch {
    pub entries: usize,
    pub ops: usize,
}

#[derive(Debug, Default)]
struct Counters {
    writes: usize,
    commit_attempts: usize,
    fail_on_attempt: Option<usize>,
    committed: Vec<CommittedBatch>,
}

pub struct MemoryStore {
    collections: RwLock<Collections>,
    counters: Mutex<Counters>,
    max_batch_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::with_batch_size(DEFAULT_MAX_BATCH_SIZE) }
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_batch_size(max_batch_size: usize) -> Self {
        Self { collections: RwLock::new(BTreeMap::new()), counters: Mutex::new(Counters::default()), max_batch_size }
    }

    /// Writes a document without counting it as a job write.
    pub async fn seed(&self, path: DocumentPath, fields: Fields) {
        let mut collections = self.collections.write().await;
        apply(&mut collections, BatchOp::Set { path, fields });
    }

    pub async fn document(&self, path: &DocumentPath) -> Option<Fields> {
        let collections = self.collections.read().await;
        collections.get(path.collection().as_str()).and_then(|c| c.get(path.id())).cloned()
    }

    pub async fn ids(&self, collection: &CollectionPath) -> Vec<String> {
        let collections = self.collections.read().await;
        collections.get(collection.as_str()).map(|c| c.keys().cloned().collect()).unwrap_or_default()
    }

    /// Total number of documents across every collection.
    pub async fn document_count(&self) -> usize {
        self.collections.read().await.values().map(|c| c.len()).sum()
    }

    /// Individual write operations applied so far (direct writes and batch ops).
    pub async fn write_count(&self) -> usize { self.counters.lock().await.writes }

    pub async fn committed_batches(&self) -> Vec<CommittedBatch> { self.counters.lock().await.committed.clone() }

    /// Makes the `nth` commit from now (1-based) fail without applying anything.
    pub async fn fail_commit(&self, nth: usize) {
        let mut counters = self.counters.lock().await;
        counters.fail_on_attempt = Some(counters.commit_attempts + nth);
    }
}

fn apply(collections: &mut Collections, op: BatchOp) {
    match op {
        BatchOp::Set { path, fields } => {
            collections.entry(path.collection().as_str().to_string()).or_default().insert(path.id().to_string(), fields);
        }
        BatchOp::Update { path, fields } => {
            let doc = collections.entry(path.collection().as_str().to_string()).or_default().entry(path.id().to_string()).or_default();
            doc.extend(fields);
        }
        BatchOp::Delete { path } => {
            if let Some(collection) = collections.get_mut(path.collection().as_str()) {
                collection.remove(path.id());
                if collection.is_empty() {
                    collections.remove(path.collection().as_str());
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection.as_str())
            .map(|c| c.iter().map(|(id, fields)| Document { id: id.clone(), fields: fields.clone() }).collect())
            .unwrap_or_default())
    }

    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Fields>, StoreError> {
        Ok(self.document(path).await)
    }

    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        apply(&mut *self.collections.write().await, BatchOp::Set { path: path.clone(), fields });
        self.counters.lock().await.writes += 1;
        Ok(())
    }

    async fn update_document(&self, path: &DocumentPath, partial: Fields) -> Result<(), StoreError> {
        apply(&mut *self.collections.write().await, BatchOp::Update { path: path.clone(), fields: partial });
        self.counters.lock().await.writes += 1;
        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), StoreError> {
        apply(&mut *self.collections.write().await, BatchOp::Delete { path: path.clone() });
        self.counters.lock().await.writes += 1;
        Ok(())
    }

    async fn commit_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.len() > self.max_batch_size {
            return Err(StoreError::BatchTooLarge { size: batch.len(), limit: self.max_batch_size });
        }
        let mut counters = self.counters.lock().await;
        counters.commit_attempts += 1;
        if counters.fail_on_attempt == Some(counters.commit_attempts) {
            counters.fail_on_attempt = None;
            return Err(StoreError::CommitFailed(format!("injected failure on commit {}", counters.commit_attempts)));
        }

        let entries = batch.len();
        let ops = batch.into_ops();
        let op_count = ops.len();
        let mut collections = self.collections.write().await;
        for op in ops {
            apply(&mut collections, op);
        }
        counters.writes += op_count;
        counters.committed.push(CommittedBatch { entries, ops: op_count });
        Ok(())
    }

    fn max_batch_size(&self) -> usize { self.max_batch_size }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(v: serde_json::Value) -> Fields { v.as_object().cloned().unwrap() }

    #[tokio::test]
    async fn test_update_merges_and_delete_is_idempotent() {
        let store = MemoryStore::new();
        let path = DocumentPath::category("bags");
        store.set_document(&path, fields(json!({"name": "가방", "order": 5}))).await.unwrap();
        store.update_document(&path, fields(json!({"name": "Bags"}))).await.unwrap();
        assert_eq!(store.get_document(&path).await.unwrap(), Some(fields(json!({"name": "Bags", "order": 5}))));

        store.delete_document(&path).await.unwrap();
        store.delete_document(&path).await.unwrap();
        assert_eq!(store.get_document(&path).await.unwrap(), None);
        assert_eq!(store.write_count().await, 4);
    }

    #[tokio::test]
    async fn test_subcollections_survive_parent_delete() {
        let store = MemoryStore::new();
        store.seed(DocumentPath::category("상의"), Fields::new()).await;
        store.seed(DocumentPath::product("상의", "P1"), Fields::new()).await;
        store.delete_document(&DocumentPath::category("상의")).await.unwrap();
        assert_eq!(store.ids(&CollectionPath::products("상의")).await, vec!["P1".to_string()]);
        assert!(store.ids(&CollectionPath::categories()).await.is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_applies_nothing() {
        let store = MemoryStore::with_batch_size(10);
        store.fail_commit(1).await;
        let mut batch = WriteBatch::new();
        batch.set(DocumentPath::category("bags"), Fields::new());
        assert!(matches!(store.commit_batch(batch.clone()).await, Err(StoreError::CommitFailed(_))));
        assert_eq!(store.document_count().await, 0);

        store.commit_batch(batch).await.unwrap();
        assert_eq!(store.document_count().await, 1);
        assert_eq!(store.committed_batches().await, vec![CommittedBatch { entries: 1, ops: 1 }]);
    }

    #[tokio::test]
    async fn test_rejects_oversized_batch() {
        let store = MemoryStore::with_batch_size(1);
        let mut batch = WriteBatch::new();
        batch.delete(DocumentPath::category("a"));
        batch.delete(DocumentPath::category("b"));
        assert!(matches!(store.commit_batch(batch).await, Err(StoreError::BatchTooLarge { size: 2, limit: 1 })));
    }
}
