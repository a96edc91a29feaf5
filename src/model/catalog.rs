//! Model catalog: declared models and relationships, mapped in one `configure()` step.
//!
//! Relationship declarations are collected first and only become inspectable once
//! `configure()` has validated them against the declared models. Inspecting an
//! unconfigured catalog yields nothing.

use crate::error::ConfigError;
use crate::model::ModelDef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToMany,
    ManyToMany,
    ManyToOne,
    OneToOne,
}

impl Cardinality {
    /// One-to-many and many-to-many: the relationship names a collection.
    pub fn is_to_many(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }
}

/// Join table of a many-to-many relationship.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Secondary {
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    /// Join-table column referencing the owning model.
    pub local_column: String,
    /// Join-table column referencing the target model.
    pub remote_column: String,
}

/// A relationship as declared. `local_column` is on `model`, `remote_column` on `target`;
/// records relate when the two are equal (through `secondary` for many-to-many).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub model: String,
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub local_column: String,
    pub remote_column: String,
    #[serde(default)]
    pub secondary: Option<Secondary>,
}

/// A mapped relationship, as returned by inspection.
#[derive(Clone, Debug)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub cardinality: Cardinality,
    pub target: Arc<ModelDef>,
    pub local_column: String,
    pub remote_column: String,
    pub secondary: Option<Secondary>,
}

impl RelationshipDescriptor {
    pub fn target_model(&self) -> &str {
        &self.target.name
    }
}

/// Relationship discovery over mapped models.
pub trait RelationshipInspector {
    /// True once mapping has completed and inspection results are complete.
    fn is_configured(&self) -> bool;

    /// Relationships of `model` in declaration order. Empty when unmapped.
    fn inspect(&self, model: &str) -> Vec<RelationshipDescriptor>;
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    models: Vec<ModelDef>,
    #[serde(default)]
    relationships: Vec<RelationshipDef>,
}

#[derive(Debug, Default)]
pub struct ModelCatalog {
    models: HashMap<String, Arc<ModelDef>>,
    declared: Vec<RelationshipDef>,
    mapped: HashMap<String, Vec<RelationshipDescriptor>>,
    configured: bool,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `{ "models": [...], "relationships": [...] }`. The result is not yet configured.
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_json::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))?;
        let mut catalog = ModelCatalog::new();
        for m in file.models {
            catalog.add_model(m)?;
        }
        for r in file.relationships {
            catalog.relationship(r);
        }
        Ok(catalog)
    }

    pub fn add_model(&mut self, model: ModelDef) -> Result<Arc<ModelDef>, ConfigError> {
        model.validate()?;
        let model = Arc::new(model);
        self.models.insert(model.name.clone(), model.clone());
        self.configured = false;
        Ok(model)
    }

    /// Declare a relationship. Takes effect at the next `configure()`.
    pub fn relationship(&mut self, def: RelationshipDef) -> &mut Self {
        self.declared.push(def);
        self.configured = false;
        self
    }

    pub fn model(&self, name: &str) -> Option<Arc<ModelDef>> {
        self.models.get(name).cloned()
    }

    /// Map all declared relationships. Idempotent.
    pub fn configure(&mut self) -> Result<(), ConfigError> {
        let mut mapped: HashMap<String, Vec<RelationshipDescriptor>> = HashMap::new();
        for def in &self.declared {
            let owner = self
                .models
                .get(&def.model)
                .ok_or_else(|| ConfigError::UnknownModel(def.model.clone()))?;
            let target = self
                .models
                .get(&def.target)
                .ok_or_else(|| ConfigError::UnknownModel(def.target.clone()))?;
            check_column(owner, def, &def.local_column)?;
            check_column(target, def, &def.remote_column)?;
            match (def.cardinality, &def.secondary) {
                (Cardinality::ManyToMany, None) => {
                    return Err(ConfigError::Validation(format!(
                        "relationship '{}' on {}: many_to_many requires a secondary table",
                        def.name, def.model
                    )));
                }
                (Cardinality::ManyToMany, Some(_)) | (_, None) => {}
                (_, Some(_)) => {
                    return Err(ConfigError::Validation(format!(
                        "relationship '{}' on {}: secondary table only applies to many_to_many",
                        def.name, def.model
                    )));
                }
            }
            let entry = mapped.entry(def.model.clone()).or_default();
            let descriptor = RelationshipDescriptor {
                name: def.name.clone(),
                cardinality: def.cardinality,
                target: target.clone(),
                local_column: def.local_column.clone(),
                remote_column: def.remote_column.clone(),
                secondary: def.secondary.clone(),
            };
            match entry.iter_mut().find(|d| d.name == def.name) {
                Some(existing) => *existing = descriptor,
                None => entry.push(descriptor),
            }
        }
        tracing::debug!(models = self.models.len(), relationships = self.declared.len(), "catalog configured");
        self.mapped = mapped;
        self.configured = true;
        Ok(())
    }
}

fn check_column(model: &ModelDef, def: &RelationshipDef, column: &str) -> Result<(), ConfigError> {
    if model.has_column(column) {
        Ok(())
    } else {
        Err(ConfigError::InvalidRelationshipColumn {
            model: def.model.clone(),
            relationship: def.name.clone(),
            column: column.to_string(),
        })
    }
}

impl RelationshipInspector for ModelCatalog {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn inspect(&self, model: &str) -> Vec<RelationshipDescriptor> {
        if !self.configured {
            return Vec::new();
        }
        self.mapped.get(model).cloned().unwrap_or_default()
    }
}
