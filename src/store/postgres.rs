//! PostgreSQL-backed document store.
//!
//! Documents live in a single `documents` table keyed by
//! `(collection, doc_id)` with a JSONB body. A batch commits inside one
//! transaction, which gives the all-or-nothing semantics the port requires.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};

use super::{BatchOp, DocumentStore, StoreError, WriteBatch};
use crate::domain::value_objects::{CollectionPath, DocumentPath};
use crate::{Document, Fields};

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    max_batch_size: usize,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, max_batch_size: usize) -> Self { Self { pool, max_batch_size } }

    pub async fn connect(database_url: &str, max_batch_size: usize) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;
        Ok(Self::new(pool, max_batch_size))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn into_fields(path: &str, value: Value) -> Result<Fields, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::NotAnObject(path.to_string())),
    }
}

async fn upsert(conn: &mut PgConnection, path: &DocumentPath, fields: Fields, merge: bool) -> Result<(), StoreError> {
    let sql = if merge {
        "INSERT INTO documents (collection, doc_id, fields, updated_at) VALUES ($1, $2, $3, NOW()) \
         ON CONFLICT (collection, doc_id) DO UPDATE SET fields = documents.fields || EXCLUDED.fields, updated_at = NOW()"
    } else {
        "INSERT INTO documents (collection, doc_id, fields, updated_at) VALUES ($1, $2, $3, NOW()) \
         ON CONFLICT (collection, doc_id) DO UPDATE SET fields = EXCLUDED.fields, updated_at = NOW()"
    };
    sqlx::query(sql)
        .bind(path.collection().as_str())
        .bind(path.id())
        .bind(Value::Object(fields))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn remove(conn: &mut PgConnection, path: &DocumentPath) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc_id = $2")
        .bind(path.collection().as_str())
        .bind(path.id())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn apply(conn: &mut PgConnection, op: BatchOp) -> Result<(), StoreError> {
    match op {
        BatchOp::Set { path, fields } => upsert(conn, &path, fields, false).await,
        BatchOp::Update { path, fields } => upsert(conn, &path, fields, true).await,
        BatchOp::Delete { path } => remove(conn, &path).await,
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list_documents(&self, collection: &CollectionPath) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query_as::<_, (String, Value)>(
            "SELECT doc_id, fields FROM documents WHERE collection = $1 ORDER BY doc_id",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(id, value)| {
                let fields = into_fields(&format!("{collection}/{id}"), value)?;
                Ok(Document { id, fields })
            })
            .collect()
    }

    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Fields>, StoreError> {
        let row = sqlx::query_as::<_, (Value,)>("SELECT fields FROM documents WHERE collection = $1 AND doc_id = $2")
            .bind(path.collection().as_str())
            .bind(path.id())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|(value,)| into_fields(&path.to_string(), value)).transpose()
    }

    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        upsert(&mut conn, path, fields, false).await
    }

    async fn update_document(&self, path: &DocumentPath, partial: Fields) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        upsert(&mut conn, path, partial, true).await
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        remove(&mut conn, path).await
    }

    async fn commit_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.len() > self.max_batch_size {
            return Err(StoreError::BatchTooLarge { size: batch.len(), limit: self.max_batch_size });
        }
        let mut tx = self.pool.begin().await?;
        for op in batch.into_ops() {
            apply(&mut tx, op).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    fn max_batch_size(&self) -> usize { self.max_batch_size }
}
