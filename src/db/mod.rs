//! Document storage.
//!
//! Records live as JSON documents in named collections, addressed by a
//! generated UUID. Two backends implement [`DocumentStore`]: Postgres with
//! one JSONB table per collection, and an in-memory store used by tests and
//! `DATABASE_URL=memory://`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// A named collection and the top-level fields that must be unique in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub name: &'static str,
    pub unique: &'static [&'static str],
}

/// Predicate on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    Gte(&'static str, Value),
    Lte(&'static str, Value),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique field `{field}` already taken")]
    Conflict { field: &'static str },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored document is not valid: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Single-document operations; every call is atomic on its own and nothing
/// spans documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, coll: Collection, id: Uuid, doc: Value) -> StoreResult<()>;

    async fn find_by_id(&self, coll: Collection, id: Uuid) -> StoreResult<Option<Value>>;

    /// First document (in insertion order) whose `field` equals `value`.
    async fn find_one(&self, coll: Collection, field: &str, value: &Value)
        -> StoreResult<Option<Value>>;

    /// Documents matching every filter, in insertion order.
    async fn list(
        &self,
        coll: Collection,
        filters: &[Filter],
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<Value>>;

    /// Overwrites the top-level keys present in `patch`; `None` if the id is
    /// unknown.
    async fn merge(&self, coll: Collection, id: Uuid, patch: Value) -> StoreResult<Option<Value>>;

    /// `false` if the id is unknown.
    async fn delete(&self, coll: Collection, id: Uuid) -> StoreResult<bool>;

    /// Appends `value` to the string array `field` unless already present.
    async fn add_to_set(&self, coll: Collection, id: Uuid, field: &str, value: &str)
        -> StoreResult<()>;

    /// Removes every occurrence of `value` from the string array `field`.
    async fn pull(&self, coll: Collection, id: Uuid, field: &str, value: &str) -> StoreResult<()>;

    /// Backend name for logs.
    fn kind(&self) -> &'static str;
}

/// Builds the store named by `database_url`; `memory://` keeps everything in
/// process.
pub async fn connect(database_url: &str) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if database_url.starts_with("memory:") {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PgDocumentStore::connect(database_url).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}
