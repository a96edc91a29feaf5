//! Resource: one model bound to an adapter, schemas, policies and, once resolved, a route set.

mod relation;

pub use relation::{ForeignResource, RelationshipConfig};

use crate::adapter::{Adapter, AdapterParams, PostgresAdapter};
use crate::controller::{self, ControllerExtension, ResourceContext};
use crate::error::ConfigError;
use crate::id::IdType;
use crate::inflector;
use crate::model::ModelDef;
use crate::policy::{Operation, Policies, Policy};
use crate::query::DEFAULT_LIMIT;
use crate::repository::{Action, Lifecycle, LifecycleHook, Repository, Stage};
use crate::schema::{meta_object_schema, synthesize, SchemaDef, SchemaSet, SynthesisInput};
use axum::Router;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Operations whose standard routes are not mounted.
#[derive(Clone, Debug, Default)]
pub struct DisabledOperations(HashSet<Operation>);

impl DisabledOperations {
    pub fn disable(&mut self, op: Operation) {
        self.0.insert(op);
    }

    pub fn is_disabled(&self, op: Operation) -> bool {
        self.0.contains(&op)
    }
}

/// Where a policy applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyScope {
    Universal,
    Only(Operation),
}

impl From<Operation> for PolicyScope {
    fn from(op: Operation) -> Self {
        PolicyScope::Only(op)
    }
}

pub type ResolutionCallback = Box<dyn Fn(&Resource) + Send + Sync>;

enum Routes {
    Unmounted,
    Mounted(Router),
}

pub struct Resource {
    model: Arc<ModelDef>,
    id_type: IdType,
    path: String,
    tags: Vec<String>,
    create_schema: SchemaDef,
    update_schema: SchemaDef,
    response_schema: SchemaDef,
    meta_schema: SchemaDef,
    link_prefix: Option<String>,
    protected: BTreeSet<String>,
    policies: Policies,
    disabled: DisabledOperations,
    page_limit: u32,
    repository: Arc<Repository>,
    extension: Option<Arc<dyn ControllerExtension>>,
    on_resolution: Option<ResolutionCallback>,
    relations: Vec<RelationshipConfig>,
    schemas: Option<Arc<SchemaSet>>,
    routes: Routes,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("model", &self.model.name)
            .field("path", &self.path)
            .field("id_type", &self.id_type)
            .field("relations", &self.relations.iter().map(|r| &r.name).collect::<Vec<_>>())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl Resource {
    pub fn builder(model: impl Into<Arc<ModelDef>>) -> ResourceBuilder {
        ResourceBuilder::new(model.into())
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        &self.model.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn id_type(&self) -> IdType {
        self.id_type
    }

    pub fn response_schema(&self) -> &SchemaDef {
        &self.response_schema
    }

    pub fn link_prefix(&self) -> &str {
        self.link_prefix.as_deref().unwrap_or("")
    }

    pub fn protected_relationships(&self) -> &BTreeSet<String> {
        &self.protected
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    pub fn disabled(&self) -> &DisabledOperations {
        &self.disabled
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub fn controller_extension(&self) -> Option<&Arc<dyn ControllerExtension>> {
        self.extension.as_ref()
    }

    pub fn relations(&self) -> &[RelationshipConfig] {
        &self.relations
    }

    pub fn schemas(&self) -> Option<&Arc<SchemaSet>> {
        self.schemas.as_ref()
    }

    /// The mounted route set, once resolved.
    pub fn routes(&self) -> Option<&Router> {
        match &self.routes {
            Routes::Mounted(r) => Some(r),
            Routes::Unmounted => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.routes, Routes::Mounted(_))
    }

    pub fn set_link_prefix(&mut self, prefix: impl Into<String>) {
        self.link_prefix = Some(prefix.into());
    }

    /// Fill in the registry-wide prefix unless one was set on the resource.
    pub(crate) fn default_link_prefix(&mut self, prefix: &str) {
        if self.link_prefix.is_none() {
            self.link_prefix = Some(prefix.to_string());
        }
    }

    pub fn foreign(&self) -> ForeignResource {
        ForeignResource {
            model: self.model.name.clone(),
            path: self.path.clone(),
            id_type: self.id_type,
        }
    }

    /// Record one relationship edge. Re-injecting a name replaces the earlier edge.
    /// Returns whether the edge is new or points somewhere else than before.
    pub fn inject_relationship(&mut self, config: RelationshipConfig) -> bool {
        tracing::debug!(model = %self.model.name, relationship = %config.name, target = %config.foreign.model, "relationship injected");
        match self.relations.iter_mut().find(|r| r.name == config.name) {
            Some(existing) => {
                let changed = existing.foreign != config.foreign || existing.cardinality != config.cardinality;
                *existing = config;
                changed
            }
            None => {
                self.relations.push(config);
                true
            }
        }
    }

    /// Build the schema set from the base schemas and every injected relationship.
    pub fn generate_internal_schemas(&mut self) {
        let set = synthesize(SynthesisInput {
            model_name: &self.model.name,
            create: &self.create_schema,
            update: &self.update_schema,
            response: &self.response_schema,
            meta: &self.meta_schema,
            relations: &self.relations,
            protected: &self.protected,
            link_prefix: self.link_prefix(),
            path: &self.path,
            primary_key: &self.model.primary_key,
            id_type: self.id_type,
        });
        self.schemas = Some(Arc::new(set));
    }

    /// Mount the route set: controller extension first, then the standard routes.
    /// `schemas_by_model` holds the synthesized sets of every resource, keyed by model name.
    pub fn resolve(&mut self, schemas_by_model: &HashMap<String, Arc<SchemaSet>>) -> Result<(), ConfigError> {
        let schemas = self
            .schemas
            .clone()
            .ok_or_else(|| ConfigError::SchemasNotSynthesized(self.model.name.clone()))?;
        let mut foreign = HashMap::new();
        for rel in &self.relations {
            let set = schemas_by_model
                .get(&rel.foreign.model)
                .ok_or_else(|| ConfigError::SchemasNotSynthesized(rel.foreign.model.clone()))?;
            foreign.insert(rel.name.clone(), set.clone());
        }
        let ctx = ResourceContext {
            model_name: self.model.name.clone(),
            path: self.path.clone(),
            id_type: self.id_type,
            repository: self.repository.clone(),
            schemas,
            relations: self.relations.clone(),
            foreign,
            policies: self.policies.clone(),
            disabled: self.disabled.clone(),
            page_limit: self.page_limit,
        };
        let mut router = Router::new();
        if let Some(ext) = &self.extension {
            router = ext.extend(router, &ctx);
        }
        router = controller::mount(router, &ctx);
        self.routes = Routes::Mounted(router.with_state(Arc::new(ctx)));
        tracing::info!(model = %self.model.name, path = %self.path, "resource resolved");
        Ok(())
    }

    /// Drop the mounted routes so the next resolution mounts them again. Schemas are kept.
    pub(crate) fn unmount(&mut self) {
        self.routes = Routes::Unmounted;
    }

    /// Drop schemas and routes so the next resolution rebuilds both.
    pub(crate) fn invalidate(&mut self) {
        self.schemas = None;
        self.routes = Routes::Unmounted;
    }

    pub(crate) fn notify_resolved(&self) {
        if let Some(cb) = &self.on_resolution {
            cb(self);
        }
    }
}

pub struct ResourceBuilder {
    model: Arc<ModelDef>,
    id_type: Option<IdType>,
    adapter: Option<Arc<dyn Adapter>>,
    connection: Option<AdapterParams>,
    create_schema: Option<SchemaDef>,
    update_schema: Option<SchemaDef>,
    response_schema: Option<SchemaDef>,
    meta_schema: Option<SchemaDef>,
    path: Option<String>,
    tags: Option<Vec<String>>,
    link_prefix: Option<String>,
    protected: BTreeSet<String>,
    policies: Policies,
    disabled: DisabledOperations,
    lifecycle: Lifecycle,
    page_limit: u32,
    extension: Option<Arc<dyn ControllerExtension>>,
    on_resolution: Option<ResolutionCallback>,
}

impl ResourceBuilder {
    fn new(model: Arc<ModelDef>) -> Self {
        ResourceBuilder {
            model,
            id_type: None,
            adapter: None,
            connection: None,
            create_schema: None,
            update_schema: None,
            response_schema: None,
            meta_schema: None,
            path: None,
            tags: None,
            link_prefix: None,
            protected: BTreeSet::new(),
            policies: Policies::default(),
            disabled: DisabledOperations::default(),
            lifecycle: Lifecycle::default(),
            page_limit: DEFAULT_LIMIT,
            extension: None,
            on_resolution: None,
        }
    }

    /// Defaults to the type inferred from the primary key column.
    pub fn id_type(mut self, id_type: IdType) -> Self {
        self.id_type = Some(id_type);
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Build a lazily-connecting Postgres adapter when no adapter instance is given.
    pub fn connection(mut self, params: AdapterParams) -> Self {
        self.connection = Some(params);
        self
    }

    pub fn create_schema(mut self, schema: SchemaDef) -> Self {
        self.create_schema = Some(schema);
        self
    }

    pub fn update_schema(mut self, schema: SchemaDef) -> Self {
        self.update_schema = Some(schema);
        self
    }

    pub fn response_schema(mut self, schema: SchemaDef) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn meta_schema(mut self, schema: SchemaDef) -> Self {
        self.meta_schema = Some(schema);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn link_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.link_prefix = Some(prefix.into());
        self
    }

    pub fn protected_relationships<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn policy(mut self, scope: impl Into<PolicyScope>, policy: Arc<dyn Policy>) -> Self {
        match scope.into() {
            PolicyScope::Universal => self.policies.add_universal(policy),
            PolicyScope::Only(op) => self.policies.add(op, policy),
        }
        self
    }

    pub fn disable(mut self, op: Operation) -> Self {
        self.disabled.disable(op);
        self
    }

    pub fn hook(mut self, stage: Stage, action: Action, hook: Arc<dyn LifecycleHook>) -> Self {
        self.lifecycle.set(stage, action, hook);
        self
    }

    pub fn page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    pub fn controller_extension(mut self, ext: Arc<dyn ControllerExtension>) -> Self {
        self.extension = Some(ext);
        self
    }

    pub fn on_resolution<F>(mut self, f: F) -> Self
    where
        F: Fn(&Resource) + Send + Sync + 'static,
    {
        self.on_resolution = Some(Box::new(f));
        self
    }

    fn missing(&self, field: &'static str) -> ConfigError {
        ConfigError::MissingField {
            resource: self.model.name.clone(),
            field,
        }
    }

    /// Fails on a missing adapter or base schema. Does not inspect relationships.
    pub fn build(mut self) -> Result<Resource, ConfigError> {
        self.model.validate()?;
        let create_schema = self.create_schema.take().ok_or_else(|| self.missing("create schema"))?;
        let update_schema = self.update_schema.take().ok_or_else(|| self.missing("update schema"))?;
        let response_schema = self.response_schema.take().ok_or_else(|| self.missing("response schema"))?;
        let adapter: Arc<dyn Adapter> = match (self.adapter.take(), self.connection.take()) {
            (Some(a), _) => a,
            (None, Some(params)) => Arc::new(
                PostgresAdapter::connect_lazy(&params).map_err(|e| ConfigError::Load(e.to_string()))?,
            ),
            (None, None) => return Err(self.missing("adapter")),
        };

        let tag = self.model.name.to_lowercase();
        let path = self.path.unwrap_or_else(|| format!("/{}", inflector::plural(&tag)));
        let tags = self.tags.unwrap_or_else(|| vec![tag]);
        let id_type = self.id_type.unwrap_or_else(|| self.model.id_type());
        let repository = Arc::new(Repository::new(self.model.clone(), adapter, id_type, self.lifecycle));
        tracing::debug!(model = %self.model.name, %path, adapter = repository.adapter().kind(), "resource declared");

        Ok(Resource {
            model: self.model,
            id_type,
            path,
            tags,
            create_schema,
            update_schema,
            response_schema,
            meta_schema: self.meta_schema.unwrap_or_else(meta_object_schema),
            link_prefix: self.link_prefix,
            protected: self.protected,
            policies: self.policies,
            disabled: self.disabled,
            page_limit: self.page_limit,
            repository,
            extension: self.extension,
            on_resolution: self.on_resolution,
            relations: Vec::new(),
            schemas: None,
            routes: Routes::Unmounted,
        })
    }
}
