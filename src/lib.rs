//! Cruddy: CRUD resources over declared data models.
//!
//! Declare models in a [`ModelCatalog`], build a [`Resource`] per model, register the resources
//! with a [`Registry`], then `configure()` the catalog and `finalize()` the registry. Resolution
//! wires relationships, synthesizes envelope schemas with links, and mounts REST routes.

pub mod adapter;
pub mod config;
pub mod controller;
pub mod error;
pub mod id;
pub mod inflector;
pub mod links;
pub mod model;
pub mod policy;
pub mod query;
pub mod registry;
pub mod repository;
pub mod resource;
pub mod response;
pub mod routes;
pub mod schema;
pub mod sql;

pub use adapter::{Adapter, AdapterParams, MemoryAdapter, PostgresAdapter};
pub use config::{init_tracing, load_catalog, ServerConfig};
pub use controller::{ControllerExtension, ResourceContext};
pub use error::{AppError, ConfigError};
pub use id::IdType;
pub use links::LinkBuilder;
pub use model::{
    Cardinality, ColumnDef, ModelCatalog, ModelDef, RelationshipDef, RelationshipDescriptor, RelationshipInspector,
    Secondary,
};
pub use policy::{policy_fn, Operation, Policy, PolicyRequest};
pub use query::{ListQuery, Listing, Meta};
pub use registry::{Registry, ResolutionState};
pub use repository::{hook_fn, Action, LifecycleHook, Repository, Stage};
pub use resource::{PolicyScope, RelationshipConfig, Resource, ResourceBuilder};
pub use routes::{app, common_routes, common_routes_with_ready};
pub use schema::{EnvelopeInput, FieldType, ManyInput, SchemaDef, SchemaSet};
