//! PostgreSQL adapter over a sqlx pool.

use crate::adapter::Adapter;
use crate::error::AppError;
use crate::model::{Cardinality, ModelDef, RelationshipDescriptor};
use crate::query::{ListQuery, Page};
use crate::sql::{self, bind_params, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row};

const TOTAL_COLUMN: &str = "__total";

/// Parameters for building a pool when a resource is declared without an adapter instance.
#[derive(Clone, Debug)]
pub struct AdapterParams {
    pub connection_uri: String,
    pub pool_size: u32,
}

impl AdapterParams {
    pub fn new(connection_uri: impl Into<String>) -> Self {
        AdapterParams {
            connection_uri: connection_uri.into(),
            pool_size: 4,
        }
    }
}

#[derive(Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    pub fn from_pool(pool: PgPool) -> Self {
        PostgresAdapter { pool }
    }

    pub async fn connect(params: &AdapterParams) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(params.pool_size)
            .connect(&params.connection_uri)
            .await?;
        Ok(Self::from_pool(pool))
    }

    /// Pool that connects on first use; does not block.
    pub fn connect_lazy(params: &AdapterParams) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(params.pool_size)
            .connect_lazy(&params.connection_uri)?;
        Ok(Self::from_pool(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_params(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    /// Run a paginated select. A page past the end carries no window total, so `count` is
    /// run instead to keep `total` accurate.
    async fn fetch_paged(&self, q: &QueryBuf, count: QueryBuf, query: &ListQuery) -> Result<Page, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_params(sqlx::query(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        let total = match rows.first() {
            Some(r) => r.try_get::<i64, _>(TOTAL_COLUMN).unwrap_or(0) as u64,
            None if query.page > 1 => self.count(&count).await?,
            None => 0,
        };
        Ok(Page {
            rows: rows.iter().map(row_to_json).collect(),
            total,
        })
    }

    async fn count(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let n: i64 = bind_params(sqlx::query(&q.sql), &q.params)
            .fetch_one(&self.pool)
            .await?
            .try_get(0)?;
        Ok(n as u64)
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn kind(&self) -> &'static str {
        "postgresql"
    }

    async fn insert(&self, model: &ModelDef, values: &Map<String, Value>) -> Result<Value, AppError> {
        let q = sql::insert(model, values);
        self.fetch_optional(&q)
            .await?
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn fetch_one(&self, model: &ModelDef, id: &Value) -> Result<Option<Value>, AppError> {
        self.fetch_optional(&sql::select_by_id(model, id)).await
    }

    async fn fetch_page(&self, model: &ModelDef, query: &ListQuery) -> Result<Page, AppError> {
        let q = sql::select_page(model, query);
        self.fetch_paged(&q, sql::count(model, &query.filters), query).await
    }

    async fn update(
        &self,
        model: &ModelDef,
        id: &Value,
        values: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        self.fetch_optional(&sql::update(model, id, values)).await
    }

    async fn delete(&self, model: &ModelDef, id: &Value) -> Result<Option<Value>, AppError> {
        self.fetch_optional(&sql::delete(model, id)).await
    }

    async fn fetch_related(
        &self,
        model: &ModelDef,
        rel: &RelationshipDescriptor,
        id: &Value,
        query: &ListQuery,
    ) -> Result<Page, AppError> {
        if self.fetch_one(model, id).await?.is_none() {
            return Err(AppError::NotFound(format!("{} {}", model.name, id)));
        }
        let q = sql::select_related(model, rel, id, query);
        let count = sql::count_related(model, rel, id, &query.filters);
        self.fetch_paged(&q, count, query).await
    }

    async fn set_relations(
        &self,
        model: &ModelDef,
        rel: &RelationshipDescriptor,
        id: &Value,
        ids: &[Value],
    ) -> Result<(), AppError> {
        let statements = match (rel.cardinality, &rel.secondary) {
            (Cardinality::OneToMany, _) => {
                let mut v = vec![sql::detach_one_to_many(model, rel, id, ids)];
                if !ids.is_empty() {
                    v.push(sql::attach_one_to_many(model, rel, id, ids));
                }
                v
            }
            (Cardinality::ManyToMany, Some(sec)) => {
                let mut v = vec![sql::clear_secondary(model, rel, sec, id)];
                if !ids.is_empty() {
                    v.push(sql::fill_secondary(model, rel, sec, id, ids));
                }
                v
            }
            _ => {
                return Err(AppError::BadRequest(format!(
                    "relationship '{}' is not a collection",
                    rel.name
                )))
            }
        };
        let mut tx = self.pool.begin().await?;
        for q in &statements {
            tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
            bind_params(sqlx::query(&q.sql), &q.params)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

/// Convert a row to a JSON object keyed by column name. The pagination total column is skipped.
pub fn row_to_json(row: &PgRow) -> Value {
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        if name == TOTAL_COLUMN {
            continue;
        }
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(f64::from(n)) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
