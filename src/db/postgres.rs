use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{Collection, DocumentStore, Filter, StoreError, StoreResult};

/// One table per collection: `(id UUID PK, seq BIGSERIAL, doc JSONB, created_at)`.
/// `seq` gives listings a stable insertion order.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

fn map_write_error(coll: Collection, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            let constraint = db.constraint().unwrap_or_default();
            let field = coll
                .unique
                .iter()
                .copied()
                .find(|f| constraint.contains(f))
                .or_else(|| coll.unique.first().copied());
            if let Some(field) = field {
                return StoreError::Conflict { field };
            }
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, coll: Collection, id: Uuid, doc: Value) -> StoreResult<()> {
        sqlx::query(&format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", coll.name))
            .bind(id)
            .bind(Json(doc))
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(coll, e))?;
        debug!(collection = coll.name, %id, "document inserted");
        Ok(())
    }

    async fn find_by_id(&self, coll: Collection, id: Uuid) -> StoreResult<Option<Value>> {
        let doc = sqlx::query_scalar::<_, Json<Value>>(&format!(
            "SELECT doc FROM {} WHERE id = $1",
            coll.name
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc.map(|Json(v)| v))
    }

    async fn find_one(
        &self,
        coll: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Option<Value>> {
        let doc = sqlx::query_scalar::<_, Json<Value>>(&format!(
            r#"
            SELECT doc FROM {}
             WHERE doc -> $1::text = $2::jsonb
             ORDER BY seq ASC
             LIMIT 1
            "#,
            coll.name
        ))
        .bind(field)
        .bind(Json(value))
        .fetch_optional(&self.pool)
        .await?;
        Ok(doc.map(|Json(v)| v))
    }

    async fn list(
        &self,
        coll: Collection,
        filters: &[Filter],
        offset: i64,
        limit: i64,
    ) -> StoreResult<Vec<Value>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT doc FROM {} WHERE TRUE", coll.name));
        for filter in filters {
            let (field, op, value) = match filter {
                Filter::Eq(f, v) => (*f, "=", v),
                Filter::Gte(f, v) => (*f, ">=", v),
                Filter::Lte(f, v) => (*f, "<=", v),
            };
            qb.push(" AND doc -> ")
                .push_bind(field)
                .push("::text ")
                .push(op)
                .push(" ")
                .push_bind(Json(value.clone()))
                .push("::jsonb");
        }
        qb.push(" ORDER BY seq ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(v)| v).collect())
    }

    async fn merge(&self, coll: Collection, id: Uuid, patch: Value) -> StoreResult<Option<Value>> {
        let doc = sqlx::query_scalar::<_, Json<Value>>(&format!(
            "UPDATE {} SET doc = doc || $2::jsonb WHERE id = $1 RETURNING doc",
            coll.name
        ))
        .bind(id)
        .bind(Json(patch))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(coll, e))?;
        Ok(doc.map(|Json(v)| v))
    }

    async fn delete(&self, coll: Collection, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", coll.name))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn add_to_set(
        &self,
        coll: Collection,
        id: Uuid,
        field: &str,
        value: &str,
    ) -> StoreResult<()> {
        sqlx::query(&format!(
            r#"
            UPDATE {}
               SET doc = jsonb_set(doc, ARRAY[$2::text],
                                   COALESCE(doc -> $2::text, '[]'::jsonb) || to_jsonb($3::text))
             WHERE id = $1
               AND NOT COALESCE(doc -> $2::text, '[]'::jsonb) ? $3::text
            "#,
            coll.name
        ))
        .bind(id)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pull(&self, coll: Collection, id: Uuid, field: &str, value: &str) -> StoreResult<()> {
        sqlx::query(&format!(
            r#"
            UPDATE {}
               SET doc = jsonb_set(doc, ARRAY[$2::text],
                                   COALESCE(doc -> $2::text, '[]'::jsonb) - $3::text)
             WHERE id = $1
            "#,
            coll.name
        ))
        .bind(id)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "postgres"
    }
}

/// These run against a live database: set `DATABASE_URL=postgres://...` and
/// pass `--ignored`. Every document carries a fresh `run` id so reruns and
/// other data in the tables do not interfere.
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const USERS: Collection = Collection {
        name: "users",
        unique: &["username"],
    };

    async fn store() -> Option<PgDocumentStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        if !url.starts_with("postgres") {
            return None;
        }
        let store = PgDocumentStore::connect(&url).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    fn run_id() -> String {
        Uuid::new_v4().to_string()
    }

    #[tokio::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn unique_violation_maps_to_conflict() {
        let Some(store) = store().await else { return };
        let run = run_id();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let name_a = format!("ann-{run}");
        let name_b = format!("bob-{run}");

        store.insert(USERS, a, json!({"username": name_a})).await.unwrap();
        store.insert(USERS, b, json!({"username": name_b})).await.unwrap();

        let err = store
            .insert(USERS, Uuid::new_v4(), json!({"username": name_a}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "username" }));

        let err = store
            .merge(USERS, b, json!({"username": name_a}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "username" }));

        store.delete(USERS, a).await.unwrap();
        store.delete(USERS, b).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn merge_find_and_delete() {
        let Some(store) = store().await else { return };
        let run = run_id();
        let id = Uuid::new_v4();
        let username = format!("cy-{run}");
        store
            .insert(USERS, id, json!({"username": username, "email": "c@x.com", "age": 20}))
            .await
            .unwrap();

        let merged = store
            .merge(USERS, id, json!({"age": 21}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(merged["age"], 21);
        assert_eq!(merged["email"], "c@x.com");
        assert!(store
            .merge(USERS, Uuid::new_v4(), json!({"age": 1}))
            .await
            .unwrap()
            .is_none());

        let found = store
            .find_one(USERS, "username", &json!(username))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, merged);

        assert!(store.delete(USERS, id).await.unwrap());
        assert!(!store.delete(USERS, id).await.unwrap());
        assert!(store.find_by_id(USERS, id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn list_applies_range_filters_in_insertion_order() {
        let Some(store) = store().await else { return };
        let run = run_id();
        let mut ids = Vec::new();
        for (n, price) in [50.0, 150.0, 250.0, 350.0].into_iter().enumerate() {
            let id = Uuid::new_v4();
            store
                .insert(
                    USERS,
                    id,
                    json!({"username": format!("p{n}-{run}"), "run": run, "price": price}),
                )
                .await
                .unwrap();
            ids.push(id);
        }

        let filters = [
            Filter::Eq("run", json!(run)),
            Filter::Gte("price", json!(100.0)),
            Filter::Lte("price", json!(300)),
        ];
        let hits = store.list(USERS, &filters, 0, 10).await.unwrap();
        let prices: Vec<_> = hits.iter().map(|d| d["price"].as_f64().unwrap()).collect();
        assert_eq!(prices, vec![150.0, 250.0]);

        let page = store
            .list(USERS, &[Filter::Eq("run", json!(run))], 1, 2)
            .await
            .unwrap();
        let prices: Vec<_> = page.iter().map(|d| d["price"].as_f64().unwrap()).collect();
        assert_eq!(prices, vec![150.0, 250.0]);

        for id in ids {
            store.delete(USERS, id).await.unwrap();
        }
    }

    #[tokio::test]
    #[ignore = "needs a Postgres DATABASE_URL"]
    async fn set_operations_are_idempotent() {
        let Some(store) = store().await else { return };
        let id = Uuid::new_v4();
        store
            .insert(USERS, id, json!({"username": format!("set-{}", run_id())}))
            .await
            .unwrap();

        store.add_to_set(USERS, id, "dorms", "x").await.unwrap();
        store.add_to_set(USERS, id, "dorms", "x").await.unwrap();
        store.add_to_set(USERS, id, "dorms", "y").await.unwrap();
        let doc = store.find_by_id(USERS, id).await.unwrap().unwrap();
        assert_eq!(doc["dorms"], json!(["x", "y"]));

        store.pull(USERS, id, "dorms", "x").await.unwrap();
        store.pull(USERS, id, "dorms", "missing").await.unwrap();
        let doc = store.find_by_id(USERS, id).await.unwrap().unwrap();
        assert_eq!(doc["dorms"], json!(["y"]));

        store.delete(USERS, id).await.unwrap();
    }
}
