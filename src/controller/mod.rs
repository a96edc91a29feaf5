//! Standard CRUD routes generated for a resolved resource.

mod extension;

pub use extension::ControllerExtension;

use crate::error::AppError;
use crate::id::IdType;
use crate::policy::{Operation, Policies, PolicyRequest};
use crate::query::{ListQuery, Meta};
use crate::repository::Repository;
use crate::resource::{DisabledOperations, RelationshipConfig};
use crate::response::{meta_value, ok};
use crate::schema::{EnvelopeInput, ManyInput, SchemaSet};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, Uri},
    response::Response,
    routing::{get, MethodRouter},
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a generated route needs. Shared as router state.
pub struct ResourceContext {
    pub model_name: String,
    pub path: String,
    pub id_type: IdType,
    pub repository: Arc<Repository>,
    pub schemas: Arc<SchemaSet>,
    pub relations: Vec<RelationshipConfig>,
    /// Schema sets of the resources on the far side of each relationship, keyed by relationship name.
    pub foreign: HashMap<String, Arc<SchemaSet>>,
    pub policies: Policies,
    pub disabled: DisabledOperations,
    pub page_limit: u32,
}

impl ResourceContext {
    /// Absolute route path under this resource, e.g. `route_path("/search")` → "/groups/search".
    pub fn route_path(&self, suffix: &str) -> String {
        format!("{}{}", self.path, suffix)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationshipConfig> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub async fn authorize(
        &self,
        operation: Operation,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Result<(), AppError> {
        self.policies
            .enforce(&PolicyRequest {
                operation,
                resource: &self.schemas.single_name,
                method,
                uri,
                headers,
            })
            .await
    }

    fn not_found(&self, id: &str) -> AppError {
        AppError::NotFound(format!("{} {}", self.schemas.single_name, id))
    }

    /// Resolve relation setters from a create/update payload and check their ids. Runs before any write.
    async fn prepare_relations(
        &self,
        relations: Vec<(String, Vec<Value>)>,
    ) -> Result<Vec<(&RelationshipConfig, Vec<Value>)>, AppError> {
        let mut out = Vec::with_capacity(relations.len());
        for (name, ids) in relations {
            let rel = self
                .relation(&name)
                .ok_or_else(|| AppError::Validation(format!("unknown relation {}", name)))?;
            self.repository.check_related_ids(&rel.descriptor, &ids).await?;
            out.push((rel, ids));
        }
        Ok(out)
    }

    /// Apply prepared relation setters to the stored `record`.
    async fn apply_relations(
        &self,
        record: &Value,
        relations: Vec<(&RelationshipConfig, Vec<Value>)>,
    ) -> Result<(), AppError> {
        if relations.is_empty() {
            return Ok(());
        }
        let id = record
            .get(self.repository.primary_key())
            .cloned()
            .ok_or_else(|| AppError::Validation("stored record has no primary key".into()))?;
        for (rel, ids) in relations {
            self.repository.set_relations(&rel.descriptor, &id, ids).await?;
        }
        Ok(())
    }
}

type Ctx = State<Arc<ResourceContext>>;

pub async fn get_many(
    State(ctx): Ctx,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    ctx.authorize(Operation::GetMany, &method, &uri, &headers).await?;
    let query = ListQuery::from_params(ctx.repository.model(), &params, ctx.page_limit)?;
    let listing = ctx.repository.get_all(&query).await?;
    let meta = meta_value(&listing.meta());
    Ok(ok(ctx.schemas.many.build(ManyInput::FromRaw(listing.page.rows), meta)))
}

pub async fn get_one(
    State(ctx): Ctx,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(id_str): Path<String>,
) -> Result<Response, AppError> {
    ctx.authorize(Operation::GetOne, &method, &uri, &headers).await?;
    let id = ctx.id_type.parse_path(&id_str)?;
    let record = ctx.repository.get_by_id(&id).await?.ok_or_else(|| ctx.not_found(&id_str))?;
    Ok(ok(ctx.schemas.single.build(EnvelopeInput::FromRaw(record))))
}

pub async fn create(
    State(ctx): Ctx,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    ctx.authorize(Operation::Create, &method, &uri, &headers).await?;
    let payload = ctx.schemas.create.parse(&body)?;
    let relations = ctx.prepare_relations(payload.relations).await?;
    let record = ctx.repository.create(payload.fields).await?;
    if let Err(e) = ctx.apply_relations(&record, relations).await {
        ctx.repository.discard(&record).await;
        return Err(e);
    }
    Ok(ok(ctx.schemas.single.build(EnvelopeInput::FromRaw(record))))
}

pub async fn update(
    State(ctx): Ctx,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(id_str): Path<String>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    ctx.authorize(Operation::Update, &method, &uri, &headers).await?;
    let id = ctx.id_type.parse_path(&id_str)?;
    let payload = ctx.schemas.update.parse(&body)?;
    let relations = ctx.prepare_relations(payload.relations).await?;
    let previous = if relations.is_empty() {
        None
    } else {
        ctx.repository.snapshot(&id).await?
    };
    let record = ctx
        .repository
        .update(&id, payload.fields)
        .await?
        .ok_or_else(|| ctx.not_found(&id_str))?;
    if let Err(e) = ctx.apply_relations(&record, relations).await {
        if let Some(previous) = &previous {
            ctx.repository.restore(&id, previous).await;
        }
        return Err(e);
    }
    Ok(ok(ctx.schemas.single.build(EnvelopeInput::FromRaw(record))))
}

pub async fn delete(
    State(ctx): Ctx,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path(id_str): Path<String>,
) -> Result<Response, AppError> {
    ctx.authorize(Operation::Delete, &method, &uri, &headers).await?;
    let id = ctx.id_type.parse_path(&id_str)?;
    let record = ctx.repository.delete(&id).await?.ok_or_else(|| ctx.not_found(&id_str))?;
    Ok(ok(ctx.schemas.single.build(EnvelopeInput::FromRaw(record))))
}

/// `GET {path}/:id/:relation`: the related records in the far resource's envelope.
pub async fn get_relation(
    State(ctx): Ctx,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Path((id_str, relation)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    ctx.authorize(Operation::GetOne, &method, &uri, &headers).await?;
    let rel = ctx
        .relation(&relation)
        .ok_or_else(|| AppError::NotFound(format!("relation {}", relation)))?;
    let foreign = ctx
        .foreign
        .get(&rel.name)
        .ok_or_else(|| AppError::NotFound(format!("relation {}", relation)))?;
    let id = ctx.id_type.parse_path(&id_str)?;
    if ctx.repository.get_by_id(&id).await?.is_none() {
        return Err(ctx.not_found(&id_str));
    }
    if rel.is_to_many() {
        let query = ListQuery::from_params(&rel.descriptor.target, &params, ctx.page_limit)?;
        let page = ctx.repository.get_relation(&rel.descriptor, &id, &query).await?;
        let meta = meta_value(&Meta::new(&query, page.total));
        Ok(ok(foreign.many.build(ManyInput::FromRaw(page.rows), meta)))
    } else {
        let page = ctx
            .repository
            .get_relation(&rel.descriptor, &id, &ListQuery::with_limit(1))
            .await?;
        let input = EnvelopeInput::from_args(None, page.rows.into_iter().next());
        Ok(ok(foreign.single.build(input)))
    }
}

/// Attach the enabled standard routes to `router`.
pub fn mount(router: Router<Arc<ResourceContext>>, ctx: &ResourceContext) -> Router<Arc<ResourceContext>> {
    let enabled = |op: Operation| !ctx.disabled.is_disabled(op);
    let mut router = router;

    let mut collection: Option<MethodRouter<Arc<ResourceContext>>> = None;
    if enabled(Operation::GetMany) {
        collection = Some(get(get_many));
    }
    if enabled(Operation::Create) {
        collection = Some(match collection {
            Some(m) => m.post(create),
            None => axum::routing::post(create),
        });
    }
    if let Some(m) = collection {
        router = router.route(&ctx.path, m);
    }

    let mut item: Option<MethodRouter<Arc<ResourceContext>>> = None;
    if enabled(Operation::GetOne) {
        item = Some(get(get_one));
    }
    if enabled(Operation::Update) {
        item = Some(match item {
            Some(m) => m.patch(update),
            None => axum::routing::patch(update),
        });
    }
    if enabled(Operation::Delete) {
        item = Some(match item {
            Some(m) => m.delete(delete),
            None => axum::routing::delete(delete),
        });
    }
    if let Some(m) = item {
        router = router.route(&ctx.route_path("/:id"), m);
    }

    if !ctx.relations.is_empty() && enabled(Operation::GetOne) {
        router = router.route(&ctx.route_path("/:id/:relation"), get(get_relation));
    }
    tracing::debug!(model = %ctx.model_name, path = %ctx.path, "standard routes mounted");
    router
}
