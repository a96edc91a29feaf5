//! Repository: one model bound to one adapter, with lifecycle hooks around every operation.

mod lifecycle;

pub use lifecycle::{hook_fn, Action, Lifecycle, LifecycleHook, Stage};

use crate::adapter::Adapter;
use crate::error::AppError;
use crate::id::IdType;
use crate::model::{ModelDef, RelationshipDescriptor};
use crate::query::{ListQuery, Listing, Page};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub struct Repository {
    model: Arc<ModelDef>,
    adapter: Arc<dyn Adapter>,
    id_type: IdType,
    lifecycle: Lifecycle,
}

fn into_object(v: Value, what: &str) -> Result<Map<String, Value>, AppError> {
    match v {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::Validation(format!("{} must remain a JSON object", what))),
    }
}

impl Repository {
    pub fn new(model: Arc<ModelDef>, adapter: Arc<dyn Adapter>, id_type: IdType, lifecycle: Lifecycle) -> Self {
        Repository {
            model,
            adapter,
            id_type,
            lifecycle,
        }
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    pub fn primary_key(&self) -> &str {
        &self.model.primary_key
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub async fn create(&self, data: Map<String, Value>) -> Result<Value, AppError> {
        let mut payload = Value::Object(data);
        self.lifecycle.run(Stage::Before, Action::Create, &mut payload).await?;
        let values = into_object(payload, "create payload")?;
        let mut record = self.adapter.insert(&self.model, &values).await?;
        self.lifecycle.run(Stage::After, Action::Create, &mut record).await?;
        Ok(record)
    }

    pub async fn get_by_id(&self, id: &Value) -> Result<Option<Value>, AppError> {
        let mut id = id.clone();
        self.lifecycle.run(Stage::Before, Action::GetOne, &mut id).await?;
        let Some(mut record) = self.adapter.fetch_one(&self.model, &id).await? else {
            return Ok(None);
        };
        self.lifecycle.run(Stage::After, Action::GetOne, &mut record).await?;
        Ok(Some(record))
    }

    /// List records. The returned query is the one actually run, which a before-hook may have rewritten.
    pub async fn get_all(&self, query: &ListQuery) -> Result<Listing, AppError> {
        let query = if self.lifecycle.has(Stage::Before, Action::GetAll) {
            let mut q = serde_json::to_value(query).map_err(|e| AppError::BadRequest(e.to_string()))?;
            self.lifecycle.run(Stage::Before, Action::GetAll, &mut q).await?;
            serde_json::from_value(q)
                .map_err(|e| AppError::Validation(format!("list query rewritten by hook: {}", e)))?
        } else {
            query.clone()
        };
        let mut page = self.adapter.fetch_page(&self.model, &query).await?;
        if self.lifecycle.has(Stage::After, Action::GetAll) {
            let mut rows = Value::Array(std::mem::take(&mut page.rows));
            self.lifecycle.run(Stage::After, Action::GetAll, &mut rows).await?;
            page.rows = match rows {
                Value::Array(r) => r,
                _ => return Err(AppError::Validation("list rows must remain a JSON array".into())),
            };
        }
        Ok(Listing { query, page })
    }

    pub async fn update(&self, id: &Value, data: Map<String, Value>) -> Result<Option<Value>, AppError> {
        let mut payload = Value::Object(data);
        self.lifecycle.run(Stage::Before, Action::Update, &mut payload).await?;
        let values = into_object(payload, "update payload")?;
        let Some(mut record) = self.adapter.update(&self.model, id, &values).await? else {
            return Ok(None);
        };
        self.lifecycle.run(Stage::After, Action::Update, &mut record).await?;
        Ok(Some(record))
    }

    pub async fn delete(&self, id: &Value) -> Result<Option<Value>, AppError> {
        let mut id = id.clone();
        self.lifecycle.run(Stage::Before, Action::Delete, &mut id).await?;
        let Some(mut record) = self.adapter.delete(&self.model, &id).await? else {
            return Ok(None);
        };
        self.lifecycle.run(Stage::After, Action::Delete, &mut record).await?;
        Ok(Some(record))
    }

    /// Rows of the relationship target for record `id`.
    pub async fn get_relation(
        &self,
        rel: &RelationshipDescriptor,
        id: &Value,
        query: &ListQuery,
    ) -> Result<Page, AppError> {
        self.adapter.fetch_related(&self.model, rel, id, query).await
    }

    /// Fail when any of `ids` names no stored record of the relationship target.
    pub async fn check_related_ids(&self, rel: &RelationshipDescriptor, ids: &[Value]) -> Result<(), AppError> {
        for id in ids {
            if self.adapter.fetch_one(&rel.target, id).await?.is_none() {
                return Err(AppError::Validation(format!("unknown {} id {}", rel.target.name, id)));
            }
        }
        Ok(())
    }

    /// Stored row for `id` as the adapter sees it. Hooks do not run.
    pub async fn snapshot(&self, id: &Value) -> Result<Option<Value>, AppError> {
        self.adapter.fetch_one(&self.model, id).await
    }

    /// Remove a just-created record whose follow-up writes failed. Hooks do not run.
    pub async fn discard(&self, record: &Value) {
        let Some(id) = record.get(self.primary_key()) else {
            return;
        };
        if let Err(e) = self.adapter.delete(&self.model, id).await {
            tracing::warn!(model = %self.model.name, %id, error = %e, "failed to discard record");
        }
    }

    /// Write back a `snapshot` taken before an update whose follow-up writes failed. Hooks do not run.
    pub async fn restore(&self, id: &Value, previous: &Value) {
        let Some(values) = previous.as_object() else {
            return;
        };
        if let Err(e) = self.adapter.update(&self.model, id, values).await {
            tracing::warn!(model = %self.model.name, %id, error = %e, "failed to restore record");
        }
    }

    /// Replace a to-many relation. Hooks receive `{"relation", "id", "ids"}`; before-hooks may rewrite `ids`.
    pub async fn set_relations(
        &self,
        rel: &RelationshipDescriptor,
        id: &Value,
        ids: Vec<Value>,
    ) -> Result<(), AppError> {
        let mut payload = json!({ "relation": rel.name, "id": id, "ids": ids });
        self.lifecycle.run(Stage::Before, Action::SetRelations, &mut payload).await?;
        let ids = match payload.get_mut("ids").map(Value::take) {
            Some(Value::Array(ids)) => ids,
            _ => return Err(AppError::Validation("relation ids must remain a JSON array".into())),
        };
        self.adapter.set_relations(&self.model, rel, id, &ids).await?;
        let mut done = json!({ "relation": rel.name, "id": id, "ids": ids });
        self.lifecycle.run(Stage::After, Action::SetRelations, &mut done).await?;
        Ok(())
    }
}
