//! Persistence adapters. Records travel as JSON objects keyed by column name.

mod memory;
mod postgres;

pub use memory::MemoryAdapter;
pub use postgres::{row_to_json, AdapterParams, PostgresAdapter};

use crate::error::AppError;
use crate::model::{ModelDef, RelationshipDescriptor};
use crate::query::{ListQuery, Page};
use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Short name for logs ("postgresql", "memory").
    fn kind(&self) -> &'static str;

    /// Insert one record; returns the stored row including generated keys.
    async fn insert(&self, model: &ModelDef, values: &Map<String, Value>) -> Result<Value, AppError>;

    async fn fetch_one(&self, model: &ModelDef, id: &Value) -> Result<Option<Value>, AppError>;

    async fn fetch_page(&self, model: &ModelDef, query: &ListQuery) -> Result<Page, AppError>;

    /// Update columns present in `values`; returns the updated row or None when absent.
    async fn update(&self, model: &ModelDef, id: &Value, values: &Map<String, Value>)
        -> Result<Option<Value>, AppError>;

    /// Delete by id; returns the deleted row or None when absent.
    async fn delete(&self, model: &ModelDef, id: &Value) -> Result<Option<Value>, AppError>;

    /// Rows of `rel.target` related to the `model` record with primary key `id`.
    async fn fetch_related(
        &self,
        model: &ModelDef,
        rel: &RelationshipDescriptor,
        id: &Value,
        query: &ListQuery,
    ) -> Result<Page, AppError>;

    /// Replace the to-many relation of record `id` with the target records whose primary keys are `ids`.
    async fn set_relations(
        &self,
        model: &ModelDef,
        rel: &RelationshipDescriptor,
        id: &Value,
        ids: &[Value],
    ) -> Result<(), AppError>;

    /// Liveness check used by the readiness route.
    async fn ping(&self) -> Result<(), AppError>;
}
