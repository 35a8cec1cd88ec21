//! Generic CRUD over one document collection.

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::{Collection, DocumentStore, Filter, StoreResult},
    error::AppError,
};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// An entity stored as one document.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
    /// Human name used in "not found" messages.
    const KIND: &'static str;

    fn id(&self) -> Uuid;
}

/// `skip`/`limit` window; limit defaults to 10 and is capped at 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Result<Self, AppError> {
        let skip = skip.unwrap_or(0);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if skip < 0 {
            return Err(AppError::validation("skip must not be negative"));
        }
        if limit < 1 {
            return Err(AppError::validation("limit must be at least 1"));
        }
        Ok(Self {
            skip,
            limit: limit.min(MAX_LIMIT),
        })
    }
}

pub struct Repository<'a, E> {
    store: &'a dyn DocumentStore,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Document> Repository<'a, E> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            store,
            _entity: PhantomData,
        }
    }

    /// Generates a fresh id, builds the entity from it and persists it.
    pub async fn create<F>(&self, build: F) -> StoreResult<E>
    where
        F: FnOnce(Uuid) -> E + Send,
    {
        let entity = build(Uuid::new_v4());
        let doc = serde_json::to_value(&entity)?;
        self.store.insert(E::COLLECTION, entity.id(), doc).await?;
        Ok(entity)
    }

    pub async fn list(&self, page: Page, filters: &[Filter]) -> StoreResult<Vec<E>> {
        let docs = self
            .store
            .list(E::COLLECTION, filters, page.skip, page.limit)
            .await?;
        docs.into_iter()
            .map(|d| serde_json::from_value(d).map_err(Into::into))
            .collect()
    }

    /// Every matching entity, in insertion order, read one full page at a time.
    pub async fn scan(&self, filters: &[Filter]) -> StoreResult<Vec<E>> {
        let mut all = Vec::new();
        loop {
            let page = Page {
                skip: all.len() as i64,
                limit: MAX_LIMIT,
            };
            let batch = self.list(page, filters).await?;
            let done = (batch.len() as i64) < MAX_LIMIT;
            all.extend(batch);
            if done {
                return Ok(all);
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> StoreResult<Option<E>> {
        decode(self.store.find_by_id(E::COLLECTION, id).await?)
    }

    pub async fn find_by(&self, field: &str, value: &Value) -> StoreResult<Option<E>> {
        decode(self.store.find_one(E::COLLECTION, field, value).await?)
    }

    /// Merges the fields `patch` serializes; absent fields stay as they are.
    pub async fn update<P: Serialize + Sync>(&self, id: Uuid, patch: &P) -> StoreResult<Option<E>> {
        let patch = serde_json::to_value(patch)?;
        if patch.as_object().is_some_and(|m| m.is_empty()) {
            return self.get(id).await;
        }
        decode(self.store.merge(E::COLLECTION, id, patch).await?)
    }

    pub async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        self.store.delete(E::COLLECTION, id).await
    }
}

fn decode<E: DeserializeOwned>(doc: Option<Value>) -> StoreResult<Option<E>> {
    doc.map(serde_json::from_value)
        .transpose()
        .map_err(Into::into)
}

/// Ids that are not UUIDs cannot exist, so they read as "not found".
pub fn parse_id(raw: &str, kind: &'static str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: Uuid,
        title: String,
        body: String,
        stars: u32,
    }

    impl Document for Note {
        const COLLECTION: Collection = Collection {
            name: "notes",
            unique: &[],
        };
        const KIND: &'static str = "Note";

        fn id(&self) -> Uuid {
            self.id
        }
    }

    #[derive(Serialize)]
    struct NotePatch {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stars: Option<u32>,
    }

    fn note(id: Uuid, n: u32) -> Note {
        Note {
            id,
            title: format!("note {n}"),
            body: "body".into(),
            stars: n,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_returns_record() {
        let store = MemoryStore::new();
        let repo = Repository::<Note>::new(&store);
        let created = repo.create(|id| note(id, 1)).await.unwrap();
        assert!(!created.id.is_nil());
        assert_eq!(repo.get(created.id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn update_changes_only_present_fields() {
        let store = MemoryStore::new();
        let repo = Repository::<Note>::new(&store);
        let before = repo.create(|id| note(id, 3)).await.unwrap();

        let patch = NotePatch {
            title: Some("renamed".into()),
            stars: None,
        };
        let after = repo.update(before.id, &patch).await.unwrap().unwrap();

        assert_eq!(after.title, "renamed");
        assert_eq!(after.id, before.id);
        assert_eq!(after.body, before.body);
        assert_eq!(after.stars, before.stars);
    }

    #[tokio::test]
    async fn update_unknown_id_is_none() {
        let store = MemoryStore::new();
        let repo = Repository::<Note>::new(&store);
        let patch = NotePatch {
            title: Some("x".into()),
            stars: None,
        };
        assert!(repo.update(Uuid::new_v4(), &patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_then_get_is_none() {
        let store = MemoryStore::new();
        let repo = Repository::<Note>::new(&store);
        let created = repo.create(|id| note(id, 1)).await.unwrap();
        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get(created.id).await.unwrap().is_none());
        assert!(!repo.delete(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_respects_limit_and_is_stable() {
        let store = MemoryStore::new();
        let repo = Repository::<Note>::new(&store);
        for n in 0..15 {
            repo.create(|id| note(id, n)).await.unwrap();
        }

        let first = repo.list(Page::default(), &[]).await.unwrap();
        let second = repo.list(Page::default(), &[]).await.unwrap();
        assert_eq!(first.len(), DEFAULT_LIMIT as usize);
        assert_eq!(first, second);

        let tail = repo.list(Page::new(Some(12), Some(5)).unwrap(), &[]).await.unwrap();
        let stars: Vec<_> = tail.iter().map(|n| n.stars).collect();
        assert_eq!(stars, vec![12, 13, 14]);
    }

    #[tokio::test]
    async fn scan_reads_past_one_page() {
        let store = MemoryStore::new();
        let repo = Repository::<Note>::new(&store);
        let total = MAX_LIMIT as u32 + 5;
        for n in 0..total {
            repo.create(|id| note(id, n)).await.unwrap();
        }

        let all = repo.scan(&[]).await.unwrap();
        assert_eq!(all.len(), total as usize);
        assert_eq!(all.last().map(|n| n.stars), Some(total - 1));

        let starred = repo
            .scan(&[Filter::Gte("stars", serde_json::json!(100))])
            .await
            .unwrap();
        assert_eq!(starred.len(), 5);
    }

    #[test]
    fn page_validation() {
        assert_eq!(Page::new(None, None).unwrap(), Page::default());
        assert_eq!(Page::new(Some(0), Some(1000)).unwrap().limit, MAX_LIMIT);
        assert!(Page::new(Some(-1), None).is_err());
        assert!(Page::new(None, Some(0)).is_err());
    }

    #[test]
    fn non_uuid_ids_are_not_found() {
        assert!(matches!(parse_id("nope", "Note"), Err(AppError::NotFound("Note"))));
        assert!(parse_id(&Uuid::new_v4().to_string(), "Note").is_ok());
    }
}
