#![allow(dead_code)]

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    routing::get,
    Json, Router,
};
use cruddy::{
    policy_fn, AppError, Cardinality, ColumnDef, ControllerExtension, FieldType, ListQuery, MemoryAdapter,
    ModelCatalog, ModelDef, Operation, PolicyScope, RelationshipDef, Registry, Resource, ResourceContext, SchemaDef,
    Secondary,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const PREFIX: &str = "/api";

pub fn catalog() -> ModelCatalog {
    let mut c = ModelCatalog::new();
    c.add_model(
        ModelDef::new("Group", "groups", "id")
            .column(ColumnDef::new("id", "text").not_null())
            .column(ColumnDef::new("name", "text")),
    )
    .unwrap();
    c.add_model(
        ModelDef::new("User", "users", "id")
            .column(ColumnDef::new("id", "bigserial").not_null().with_default())
            .column(ColumnDef::new("name", "text"))
            .column(ColumnDef::new("group_id", "text")),
    )
    .unwrap();
    c.relationship(RelationshipDef {
        model: "Group".into(),
        name: "users".into(),
        target: "User".into(),
        cardinality: Cardinality::OneToMany,
        local_column: "id".into(),
        remote_column: "group_id".into(),
        secondary: None,
    })
    .relationship(RelationshipDef {
        model: "Group".into(),
        name: "members".into(),
        target: "User".into(),
        cardinality: Cardinality::ManyToMany,
        local_column: "id".into(),
        remote_column: "id".into(),
        secondary: Some(Secondary {
            schema: None,
            table: "group_members".into(),
            local_column: "group_id".into(),
            remote_column: "user_id".into(),
        }),
    })
    .relationship(RelationshipDef {
        model: "User".into(),
        name: "group".into(),
        target: "Group".into(),
        cardinality: Cardinality::ManyToOne,
        local_column: "group_id".into(),
        remote_column: "id".into(),
        secondary: None,
    });
    c
}

struct CountRoute;

async fn count(State(ctx): State<Arc<ResourceContext>>) -> Result<Json<Value>, AppError> {
    let listing = ctx.repository.get_all(&ListQuery::default()).await?;
    Ok(Json(json!({ "count": listing.page.total })))
}

impl ControllerExtension for CountRoute {
    fn extend(&self, router: Router<Arc<ResourceContext>>, ctx: &ResourceContext) -> Router<Arc<ResourceContext>> {
        router.route(&ctx.route_path("/count"), get(count))
    }
}

pub fn group_resource(c: &ModelCatalog, db: Arc<MemoryAdapter>) -> Resource {
    Resource::builder(c.model("Group").unwrap())
        .adapter(db)
        .create_schema(
            SchemaDef::new("GroupCreate")
                .field("id", FieldType::String)
                .field("name", FieldType::String),
        )
        .update_schema(SchemaDef::new("GroupUpdate").optional("name", FieldType::String))
        .response_schema(
            SchemaDef::new("GroupView")
                .field("id", FieldType::String)
                .field("name", FieldType::String),
        )
        .protected_relationships(["members"])
        .policy(
            Operation::Delete,
            policy_fn(|r| {
                if r.headers.contains_key("x-session") {
                    Ok(())
                } else {
                    Err(AppError::Unauthorized("session required".into()))
                }
            }),
        )
        .controller_extension(Arc::new(CountRoute))
        .build()
        .unwrap()
}

pub fn user_resource(c: &ModelCatalog, db: Arc<MemoryAdapter>) -> Resource {
    Resource::builder(c.model("User").unwrap())
        .adapter(db)
        .create_schema(
            SchemaDef::new("UserCreate")
                .field("name", FieldType::String)
                .optional("group_id", FieldType::String),
        )
        .update_schema(
            SchemaDef::new("UserUpdate")
                .optional("name", FieldType::String)
                .optional("group_id", FieldType::String),
        )
        .response_schema(
            SchemaDef::new("UserView")
                .field("id", FieldType::Integer)
                .field("name", FieldType::String)
                .optional("group_id", FieldType::String),
        )
        .policy(PolicyScope::Universal, policy_fn(|_| Ok(())))
        .disable(Operation::Delete)
        .build()
        .unwrap()
}

/// Group + User sharing one in-memory store, resolved.
pub fn resolved_registry() -> (Registry, Arc<MemoryAdapter>) {
    let mut c = catalog();
    let db = Arc::new(MemoryAdapter::new());
    let mut reg = Registry::new(PREFIX);
    reg.register(group_resource(&c, db.clone())).unwrap();
    reg.register(user_resource(&c, db.clone())).unwrap();
    c.configure().unwrap();
    reg.finalize(&c).unwrap();
    (reg, db)
}

pub fn router() -> Router {
    resolved_registry().0.router().unwrap()
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with(app, method, uri, body, &[]).await
}

pub async fn send_with(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
