//! Document store: the storage collaborator behind the REST mutations.
//!
//! DESIGN
//! ======
//! Documents are JSON objects keyed by a string `_id` inside a collection.
//! Every write returns the stored document; the bridge publishes exactly
//! that value and never reads the store again.
//!
//! `PgStore` keeps documents in one JSONB table. `MemoryStore` is selected
//! when no `DATABASE_URL` is configured and backs the tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Messages,
    Tasks,
    Notifications,
}

impl Collection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Tasks => "tasks",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document must be a JSON object")]
    NotAnObject,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotAnObject => "E_STORE_INVALID",
            Self::Database(_) => "E_STORE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document, assigning `_id`. Returns the stored document.
    async fn insert(&self, collection: Collection, doc: Value) -> Result<Value, StoreError>;

    async fn find(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;

    /// Replace an existing document. Returns `None` if it does not exist.
    async fn replace(&self, collection: Collection, id: &str, doc: Value) -> Result<Option<Value>, StoreError>;

    /// Delete a document. Returns the removed document, if any.
    async fn delete(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;
}

/// Stamp `_id` onto a document body.
fn with_id(mut doc: Value, id: &str) -> Result<Value, StoreError> {
    let Some(obj) = doc.as_object_mut() else {
        return Err(StoreError::NotAnObject);
    };
    obj.insert("_id".into(), Value::String(id.to_owned()));
    Ok(doc)
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<RwLock<HashMap<(Collection, String), Value>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: Collection, doc: Value) -> Result<Value, StoreError> {
        let id = new_id();
        let doc = with_id(doc, &id)?;
        self.docs
            .write()
            .await
            .insert((collection, id), doc.clone());
        Ok(doc)
    }

    async fn find(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let docs = self.docs.read().await;
        Ok(docs.get(&(collection, id.to_owned())).cloned())
    }

    async fn replace(&self, collection: Collection, id: &str, doc: Value) -> Result<Option<Value>, StoreError> {
        let doc = with_id(doc, id)?;
        let mut docs = self.docs.write().await;
        let Some(slot) = docs.get_mut(&(collection, id.to_owned())) else {
            return Ok(None);
        };
        *slot = doc.clone();
        Ok(Some(doc))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .docs
            .write()
            .await
            .remove(&(collection, id.to_owned())))
    }
}

// =============================================================================
// POSTGRES STORE
// =============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DocumentStore for PgStore {
    async fn insert(&self, collection: Collection, doc: Value) -> Result<Value, StoreError> {
        let id = new_id();
        let doc = with_id(doc, &id)?;
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(&id)
            .bind(&doc)
            .execute(&self.pool)
            .await?;
        Ok(doc)
    }

    async fn find(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query_scalar::<_, Value>("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn replace(&self, collection: Collection, id: &str, doc: Value) -> Result<Option<Value>, StoreError> {
        let doc = with_id(doc, id)?;
        let result = sqlx::query("UPDATE documents SET body = $3, updated_at = now() WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .bind(&doc)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(doc))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query_scalar::<_, Value>("DELETE FROM documents WHERE collection = $1 AND id = $2 RETURNING body")
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
