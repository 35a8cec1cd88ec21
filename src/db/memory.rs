use std::{cmp::Ordering, collections::HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Collection, DocumentStore, Filter, StoreError, StoreResult};

/// Process-local store. Each collection keeps documents in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, Vec<(Uuid, Value)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Rejects `candidate` if another document already holds one of its unique
/// values. `skip` is the document being rewritten.
fn check_unique(
    coll: Collection,
    docs: &[(Uuid, Value)],
    candidate: &Value,
    skip: Option<Uuid>,
) -> StoreResult<()> {
    for &field in coll.unique {
        let Some(wanted) = candidate.get(field) else {
            continue;
        };
        let taken = docs
            .iter()
            .filter(|(id, _)| Some(*id) != skip)
            .any(|(_, doc)| doc.get(field) == Some(wanted));
        if taken {
            return Err(StoreError::Conflict { field });
        }
    }
    Ok(())
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn matches(doc: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(field, v) => doc.get(*field) == Some(v),
        Filter::Gte(field, v) => doc
            .get(*field)
            .and_then(|got| compare(got, v))
            .is_some_and(|o| o != Ordering::Less),
        Filter::Lte(field, v) => doc
            .get(*field)
            .and_then(|got| compare(got, v))
            .is_some_and(|o| o != Ordering::Greater),
    }
}

/// Top-level merge, same semantics as Postgres `jsonb || jsonb` on objects.
fn merge_into(doc: &mut Value, patch: Value) {
    match (doc, patch) {
        (Value::Object(target), Value::Object(src)) => {
            for (k, v) in src {
                target.insert(k, v);
            }
        }
        (doc, patch) => *doc = patch,
    }
}

fn string_array<'a>(doc: &'a mut Value, field: &str) -> Option<&'a mut Vec<Value>> {
    let obj = doc.as_object_mut()?;
    let entry = obj
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !entry.is_array() {
        *entry = Value::Array(Vec::new());
    }
    entry.as_array_mut()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, coll: Collection, id: Uuid, doc: Value) -> StoreResult<()> {
        let mut guard = self.collections.write().await;
        let docs = guard.entry(coll.name).or_default();
        check_unique(coll, docs, &doc, None)?;
        docs.push((id, doc));
        Ok(())
    }

    async fn find_by_id(&self, coll: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(coll.name)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| *doc_id == id))
            .map(|(_, doc)| doc.clone()))
    }

    async fn find_one(
        &self,
        coll: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Option<Value>> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(coll.name)
            .and_then(|docs| docs.iter().find(|(_, doc)| doc.get(field) == Some(value)))
            .map(|(_, doc)| doc.clone()))
    }

    async fn list(
        &self,
        coll: Collection,
        filters: &[Filter],
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<Value>> {
        let guard = self.collections.read().await;
        let Some(docs) = guard.get(coll.name) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(_, doc)| filters.iter().all(|f| matches(doc, f)))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn merge(&self, coll: Collection, id: Uuid, patch: Value) -> StoreResult<Option<Value>> {
        let mut guard = self.collections.write().await;
        let docs = guard.entry(coll.name).or_default();
        let Some(pos) = docs.iter().position(|(doc_id, _)| *doc_id == id) else {
            return Ok(None);
        };
        let mut updated = docs[pos].1.clone();
        merge_into(&mut updated, patch);
        check_unique(coll, docs, &updated, Some(id))?;
        docs[pos].1 = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, coll: Collection, id: Uuid) -> StoreResult<bool> {
        let mut guard = self.collections.write().await;
        let Some(docs) = guard.get_mut(coll.name) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|(doc_id, _)| *doc_id != id);
        Ok(docs.len() != before)
    }

    async fn add_to_set(
        &self,
        coll: Collection,
        id: Uuid,
        field: &str,
        value: &str,
    ) -> StoreResult<()> {
        let mut guard = self.collections.write().await;
        let doc = guard
            .get_mut(coll.name)
            .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| *doc_id == id))
            .map(|(_, doc)| doc);
        if let Some(items) = doc.and_then(|d| string_array(d, field)) {
            if !items.iter().any(|v| v.as_str() == Some(value)) {
                items.push(Value::String(value.to_string()));
            }
        }
        Ok(())
    }

    async fn pull(&self, coll: Collection, id: Uuid, field: &str, value: &str) -> StoreResult<()> {
        let mut guard = self.collections.write().await;
        let doc = guard
            .get_mut(coll.name)
            .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| *doc_id == id))
            .map(|(_, doc)| doc);
        if let Some(items) = doc.and_then(|d| string_array(d, field)) {
            items.retain(|v| v.as_str() != Some(value));
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
