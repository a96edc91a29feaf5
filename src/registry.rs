//! Resource registry and resolution coordinator.
//!
//! Resources are registered first and resolved in one explicit `finalize()` call once the
//! model catalog reports its mappers configured. Resolution runs in strict phases over the
//! whole batch: every resource gets all its relationships injected, then every resource
//! synthesizes its schemas, then every resource mounts its routes.

use crate::controller::ControllerExtension;
use crate::error::ConfigError;
use crate::model::{ModelDef, RelationshipDescriptor, RelationshipInspector};
use crate::repository::Repository;
use crate::resource::{ForeignResource, RelationshipConfig, Resource};
use crate::schema::SchemaSet;
use axum::{routing::get, Json, Router};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use utoipa::openapi::{info::InfoBuilder, path::PathsBuilder, schema::ComponentsBuilder, OpenApi, OpenApiBuilder};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionState {
    Idle,
    Pending,
    Inspecting,
    Synthesizing,
    Routing,
    Ready,
}

pub struct Registry {
    link_prefix: String,
    resources: Vec<Resource>,
    models: HashMap<String, Arc<ModelDef>>,
    relationships: HashMap<String, Vec<RelationshipDescriptor>>,
    by_model: HashMap<String, usize>,
    state: ResolutionState,
    invoked: bool,
    completed: bool,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new("")
    }
}

impl Registry {
    /// `link_prefix` is applied to every resource that does not set its own.
    pub fn new(link_prefix: impl Into<String>) -> Self {
        Registry {
            link_prefix: link_prefix.into(),
            resources: Vec::new(),
            models: HashMap::new(),
            relationships: HashMap::new(),
            by_model: HashMap::new(),
            state: ResolutionState::Idle,
            invoked: false,
            completed: false,
        }
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.completed
    }

    pub fn link_prefix(&self) -> &str {
        &self.link_prefix
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Track a resource. The first registration after a completed resolution schedules
    /// the next one; later registrations join the same batch.
    pub fn register(&mut self, mut resource: Resource) -> Result<(), ConfigError> {
        let name = resource.model_name().to_string();
        if self.by_model.contains_key(&name) {
            return Err(ConfigError::DuplicateResource(name));
        }
        if self.resources.iter().any(|r| r.path() == resource.path()) {
            return Err(ConfigError::DuplicatePath(resource.path().to_string()));
        }
        resource.default_link_prefix(&self.link_prefix);
        self.models.insert(name.clone(), resource.model().clone());
        self.by_model.insert(name.clone(), self.resources.len());
        self.resources.push(resource);
        self.completed = false;
        if self.invoked {
            tracing::debug!(model = %name, "registration joined pending resolution");
        } else {
            self.invoked = true;
            self.state = ResolutionState::Pending;
            tracing::debug!(model = %name, "resolution scheduled");
        }
        Ok(())
    }

    /// Run the pending resolution. A no-op when already ready with nothing new registered.
    pub fn finalize(&mut self, inspector: &dyn RelationshipInspector) -> Result<(), ConfigError> {
        if !self.invoked {
            tracing::debug!(state = ?self.state, "nothing to resolve");
            return Ok(());
        }
        if !inspector.is_configured() {
            return Err(ConfigError::MappersNotConfigured);
        }
        let result = self.run_resolution(inspector);
        if result.is_err() {
            self.state = ResolutionState::Pending;
        }
        result
    }

    fn run_resolution(&mut self, inspector: &dyn RelationshipInspector) -> Result<(), ConfigError> {
        self.set_state(ResolutionState::Inspecting);
        let fresh: HashSet<usize> = (0..self.resources.len())
            .filter(|&i| !self.resources[i].is_resolved())
            .collect();
        let foreign: HashMap<String, ForeignResource> = self
            .resources
            .iter()
            .map(|r| (r.model_name().to_string(), r.foreign()))
            .collect();
        // resolved resources that gained or re-targeted an edge
        let mut changed: HashSet<String> = HashSet::new();
        for resource in &mut self.resources {
            let owner = resource.model_name().to_string();
            let descriptors = inspector.inspect(&owner);
            for d in &descriptors {
                let target = foreign
                    .get(d.target_model())
                    .ok_or_else(|| ConfigError::UnregisteredModel {
                        owner: owner.clone(),
                        relationship: d.name.clone(),
                        model: d.target_model().to_string(),
                    })?;
                let edge_changed = resource.inject_relationship(RelationshipConfig::new(d.clone(), target.clone()));
                if edge_changed && resource.is_resolved() {
                    changed.insert(owner.clone());
                }
            }
            self.relationships.insert(owner, descriptors);
        }
        if !changed.is_empty() {
            for resource in &mut self.resources {
                if changed.contains(resource.model_name()) {
                    tracing::info!(model = %resource.model_name(), "relationships changed, rebuilding schemas and routes");
                    resource.invalidate();
                } else if resource.is_resolved()
                    && resource.relations().iter().any(|r| changed.contains(&r.foreign.model))
                {
                    // relation routes render the changed resource's envelopes
                    resource.unmount();
                }
            }
        }

        self.set_state(ResolutionState::Synthesizing);
        for resource in self.resources.iter_mut().filter(|r| r.schemas().is_none()) {
            resource.generate_internal_schemas();
        }

        self.set_state(ResolutionState::Routing);
        let schemas: HashMap<String, Arc<SchemaSet>> = self
            .resources
            .iter()
            .filter_map(|r| r.schemas().map(|s| (r.model_name().to_string(), s.clone())))
            .collect();
        for resource in self.resources.iter_mut().filter(|r| !r.is_resolved()) {
            resource.resolve(&schemas)?;
        }

        self.completed = true;
        self.invoked = false;
        self.set_state(ResolutionState::Ready);
        let mut fresh: Vec<usize> = fresh.into_iter().collect();
        fresh.sort_unstable();
        for i in fresh {
            self.resources[i].notify_resolved();
        }
        Ok(())
    }

    fn set_state(&mut self, next: ResolutionState) {
        tracing::info!(from = ?self.state, to = ?next, resources = self.resources.len(), "resolution state");
        self.state = next;
    }

    pub fn get_model_by_name(&self, name: &str) -> Option<&Arc<ModelDef>> {
        self.models.get(name)
    }

    /// Relationships found for a model by the last resolution.
    pub fn get_relationships_by_name(&self, name: &str) -> Option<&[RelationshipDescriptor]> {
        self.relationships.get(name).map(Vec::as_slice)
    }

    pub fn get_resource_by_name(&self, name: &str) -> Option<&Resource> {
        self.by_model.get(name).map(|&i| &self.resources[i])
    }

    pub fn get_resource_by_name_mut(&mut self, name: &str) -> Option<&mut Resource> {
        let i = *self.by_model.get(name)?;
        self.resources.get_mut(i)
    }

    pub fn get_repository_by_name(&self, name: &str) -> Option<&Arc<Repository>> {
        self.get_resource_by_name(name).map(Resource::repository)
    }

    pub fn get_controller_by_name(&self, name: &str) -> Option<&Router> {
        self.get_resource_by_name(name).and_then(Resource::routes)
    }

    pub fn get_controller_extension_by_name(&self, name: &str) -> Option<&Arc<dyn ControllerExtension>> {
        self.get_resource_by_name(name).and_then(Resource::controller_extension)
    }

    /// OpenAPI document covering every resolved resource.
    pub fn openapi(&self) -> OpenApi {
        let mut components = ComponentsBuilder::new();
        let mut paths = PathsBuilder::new();
        for r in &self.resources {
            let Some(set) = r.schemas() else { continue };
            for (name, schema) in set.components() {
                components = components.schema(name, schema);
            }
            for (path, item) in set.paths(r.path(), r.tags(), r.id_type(), |op| !r.disabled().is_disabled(op)) {
                paths = paths.path(path, item);
            }
        }
        OpenApiBuilder::new()
            .info(InfoBuilder::new().title(env!("CARGO_PKG_NAME")).version(env!("CARGO_PKG_VERSION")).build())
            .paths(paths.build())
            .components(Some(components.build()))
            .build()
    }

    /// Every resource's mounted routes plus `GET /openapi.json`. Fails until resolution completes.
    pub fn router(&self) -> Result<Router, ConfigError> {
        if !self.completed {
            return Err(ConfigError::NotResolved);
        }
        let doc = Arc::new(self.openapi());
        let mut router = Router::new().route(
            "/openapi.json",
            get(move || {
                let doc = doc.clone();
                async move { Json(doc.as_ref().clone()) }
            }),
        );
        for r in &self.resources {
            if let Some(routes) = r.routes() {
                router = router.merge(routes.clone());
            }
        }
        Ok(router)
    }
}
