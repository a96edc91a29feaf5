//! Example consumer: Group and User resources over Postgres or the in-memory store.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Set `DATABASE_URL` to use Postgres (tables must exist); otherwise rows live in memory.
//! Set `CRUDDY_MODELS` to a JSON catalog file to replace the built-in models.

use cruddy::{
    app, init_tracing, load_catalog, policy_fn, Adapter, AppError, Cardinality, ColumnDef, FieldType, MemoryAdapter,
    ModelCatalog, ModelDef, Operation, PostgresAdapter, RelationshipDef, Registry, Resource, SchemaDef,
    ServerConfig,
};
use std::sync::Arc;
use tokio::net::TcpListener;

fn builtin_catalog() -> Result<ModelCatalog, cruddy::ConfigError> {
    let mut catalog = ModelCatalog::new();
    catalog.add_model(
        ModelDef::new("Group", "groups", "id")
            .column(ColumnDef::new("id", "uuid").not_null().with_default())
            .column(ColumnDef::new("name", "text").not_null()),
    )?;
    catalog.add_model(
        ModelDef::new("User", "users", "id")
            .column(ColumnDef::new("id", "uuid").not_null().with_default())
            .column(ColumnDef::new("name", "text").not_null())
            .column(ColumnDef::new("group_id", "uuid")),
    )?;
    catalog
        .relationship(RelationshipDef {
            model: "Group".into(),
            name: "users".into(),
            target: "User".into(),
            cardinality: Cardinality::OneToMany,
            local_column: "id".into(),
            remote_column: "group_id".into(),
            secondary: None,
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
    Ok(catalog)
}

fn resource(
    catalog: &ModelCatalog,
    name: &str,
    fields: &[(&str, FieldType, bool)],
    adapter: Arc<dyn Adapter>,
    page_limit: u32,
) -> Result<Resource, cruddy::ConfigError> {
    let model = catalog
        .model(name)
        .ok_or_else(|| cruddy::ConfigError::UnknownModel(name.to_string()))?;
    let mut create = SchemaDef::new(format!("{}Create", name));
    let mut update = SchemaDef::new(format!("{}Update", name));
    let mut view = SchemaDef::new(format!("{}View", name)).field("id", FieldType::Uuid);
    for (field, ty, required) in fields {
        create = if *required {
            create.field(*field, ty.clone())
        } else {
            create.optional(*field, ty.clone())
        };
        update = update.optional(*field, ty.clone());
        view = view.optional(*field, ty.clone());
    }
    Resource::builder(model)
        .adapter(adapter)
        .create_schema(create)
        .update_schema(update)
        .response_schema(view)
        .page_limit(page_limit)
        .policy(
            Operation::Delete,
            policy_fn(|req| {
                if req.headers.contains_key("x-session") {
                    Ok(())
                } else {
                    Err(AppError::Unauthorized("x-session header required".into()))
                }
            }),
        )
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    init_tracing("cruddy=info,example_consumer=info");

    let adapter: Arc<dyn Adapter> = match config.adapter_params() {
        Some(params) => Arc::new(PostgresAdapter::connect(&params).await?),
        None => Arc::new(MemoryAdapter::new()),
    };
    let mut catalog = match &config.models_path {
        Some(path) => load_catalog(path)?,
        None => builtin_catalog()?,
    };

    let mut registry = Registry::new(config.link_prefix.clone());
    registry.register(resource(
        &catalog,
        "Group",
        &[("name", FieldType::String, true)],
        adapter.clone(),
        config.page_limit,
    )?)?;
    registry.register(resource(
        &catalog,
        "User",
        &[("name", FieldType::String, true), ("group_id", FieldType::Uuid, false)],
        adapter.clone(),
        config.page_limit,
    )?)?;

    catalog.configure()?;
    registry.finalize(&catalog)?;

    let router = app(&registry, adapter, &config)?;
    let listener = TcpListener::bind(config.bind.as_str()).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
