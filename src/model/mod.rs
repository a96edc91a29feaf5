//! Data model metadata: tables, columns, primary keys.

mod catalog;

pub use catalog::*;

use crate::error::ConfigError;
use crate::id::IdType;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// PostgreSQL type name (e.g. "uuid", "text", "timestamptz"). Used for casts when binding.
    #[serde(rename = "type")]
    pub pg_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    /// Whether the column has a DB default (e.g. gen_random_uuid(), NOW()).
    #[serde(default)]
    pub has_default: bool,
}

fn default_true() -> bool {
    true
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, pg_type: impl Into<String>) -> Self {
        ColumnDef {
            name: name.into(),
            pg_type: pg_type.into(),
            nullable: true,
            has_default: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// A mapped data model. `name` is the type name ("Group") and the registry key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub table: String,
    pub primary_key: String,
    pub columns: Vec<ColumnDef>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>, table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        ModelDef {
            name: name.into(),
            schema: None,
            table: table.into(),
            primary_key: primary_key.into(),
            columns: Vec::new(),
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    pub fn pk_column(&self) -> Option<&ColumnDef> {
        self.get_column(&self.primary_key)
    }

    /// Id type implied by the primary key column.
    pub fn id_type(&self) -> IdType {
        self.pk_column().map(|c| IdType::infer(&c.pg_type)).unwrap_or(IdType::Str)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pk_column().is_none() {
            return Err(ConfigError::InvalidPrimaryKey {
                model: self.name.clone(),
                column: self.primary_key.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_must_be_a_column() {
        let m = ModelDef::new("Group", "groups", "id").column(ColumnDef::new("name", "text"));
        assert!(matches!(m.validate(), Err(ConfigError::InvalidPrimaryKey { .. })));
        let m = m.column(ColumnDef::new("id", "uuid").not_null().with_default());
        assert!(m.validate().is_ok());
        assert_eq!(m.id_type(), IdType::Uuid);
    }

    #[test]
    fn deserializes_from_json() {
        let m: ModelDef = serde_json::from_str(
            r#"{"name":"User","table":"users","primary_key":"id",
                "columns":[{"name":"id","type":"bigserial","nullable":false,"has_default":true},
                           {"name":"email","type":"text"}]}"#,
        )
        .unwrap();
        assert_eq!(m.id_type(), IdType::Int);
        assert!(m.get_column("email").unwrap().nullable);
    }
}
