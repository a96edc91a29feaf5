//! Schema definitions composed at configuration time, plus the per-resource synthesized set.

mod envelope;
mod openapi;
mod synth;

pub use envelope::*;
pub use synth::*;

use crate::error::AppError;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    Integer,
    Number,
    Boolean,
    String,
    Uuid,
    /// RFC 3339 string.
    Timestamp,
    /// Any JSON value.
    Json,
    List(Box<FieldType>),
    Object(Box<SchemaDef>),
}

impl FieldType {
    fn accepts(&self, v: &Value) -> bool {
        match self {
            FieldType::Integer => v.as_i64().is_some() || v.as_u64().is_some(),
            FieldType::Number => v.is_number(),
            FieldType::Boolean => v.is_boolean(),
            FieldType::String => v.is_string(),
            FieldType::Uuid => v.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
            FieldType::Timestamp => v
                .as_str()
                .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
            FieldType::Json => true,
            FieldType::List(inner) => v
                .as_array()
                .map(|items| items.iter().all(|i| inner.accepts(i)))
                .unwrap_or(false),
            FieldType::Object(schema) => v.is_object() && schema.validate(v).is_ok(),
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldType::Integer => "integer".into(),
            FieldType::Number => "number".into(),
            FieldType::Boolean => "boolean".into(),
            FieldType::String => "string".into(),
            FieldType::Uuid => "uuid".into(),
            FieldType::Timestamp => "timestamp".into(),
            FieldType::Json => "json".into(),
            FieldType::List(inner) => format!("list of {}", inner.describe()),
            FieldType::Object(schema) => schema.name.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
}

impl FieldDef {
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        FieldDef {
            name: name.into(),
            ty,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        FieldDef {
            name: name.into(),
            ty,
            required: false,
        }
    }
}

/// A named record shape. Composed by [`SchemaDef::extend`] rather than generated per request.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl SchemaDef {
    pub fn new(name: impl Into<String>) -> Self {
        SchemaDef {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a required field.
    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.push(FieldDef::required(name, ty));
        self
    }

    /// Add an optional (nullable, omittable) field.
    pub fn optional(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.push(FieldDef::optional(name, ty));
        self
    }

    fn push(&mut self, def: FieldDef) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == def.name) {
            *existing = def;
        } else {
            self.fields.push(def);
        }
    }

    /// New schema named `name`: this schema's fields followed by `extra`. Extra fields replace same-named ones.
    pub fn extend(&self, name: impl Into<String>, extra: impl IntoIterator<Item = FieldDef>) -> SchemaDef {
        let mut out = SchemaDef {
            name: name.into(),
            fields: self.fields.clone(),
        };
        for f in extra {
            out.push(f);
        }
        out
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Check a JSON object against this schema. Unknown keys are dropped.
    pub fn validate(&self, value: &Value) -> Result<Map<String, Value>, AppError> {
        let obj = value
            .as_object()
            .ok_or_else(|| AppError::Validation(format!("{} must be a JSON object", self.name)))?;
        let mut out = Map::new();
        for f in &self.fields {
            match obj.get(&f.name) {
                None | Some(Value::Null) if f.required => {
                    return Err(AppError::Validation(format!("{} is required", f.name)));
                }
                None => {}
                Some(Value::Null) => {
                    out.insert(f.name.clone(), Value::Null);
                }
                Some(v) => {
                    if !f.ty.accepts(v) {
                        return Err(AppError::Validation(format!(
                            "{} must be {}",
                            f.name,
                            f.ty.describe()
                        )));
                    }
                    out.insert(f.name.clone(), v.clone());
                }
            }
        }
        Ok(out)
    }

    /// Keep only declared fields of a record. Missing fields are left out.
    pub fn project(&self, record: &Map<String, Value>) -> Map<String, Value> {
        self.fields
            .iter()
            .filter_map(|f| record.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect()
    }
}

/// Default pagination meta schema: page, limit, pages, records.
pub fn meta_object_schema() -> SchemaDef {
    SchemaDef::new("MetaObject")
        .field("page", FieldType::Integer)
        .field("limit", FieldType::Integer)
        .field("pages", FieldType::Integer)
        .field("records", FieldType::Integer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn group_create() -> SchemaDef {
        SchemaDef::new("GroupCreate")
            .field("name", FieldType::String)
            .optional("description", FieldType::String)
    }

    #[test]
    fn validate_drops_unknown_and_checks_required() {
        let s = group_create();
        let out = s.validate(&json!({"name": "Elves", "bogus": 1})).unwrap();
        assert_eq!(Value::Object(out), json!({"name": "Elves"}));
        assert!(matches!(
            s.validate(&json!({"description": "x"})),
            Err(AppError::Validation(_))
        ));
        assert!(s.validate(&json!({"name": 5})).is_err());
    }

    #[test]
    fn extend_appends_and_overrides() {
        let base = group_create();
        let ext = base.extend(
            "GroupCreateProxy",
            [
                FieldDef::optional("users", FieldType::List(Box::new(FieldType::Integer))),
                FieldDef::optional("name", FieldType::String),
            ],
        );
        assert_eq!(ext.name, "GroupCreateProxy");
        assert_eq!(ext.fields.len(), 3);
        assert!(!ext.get("name").unwrap().required);
        assert!(ext.validate(&json!({"users": [1, 2]})).is_ok());
        assert!(ext.validate(&json!({"users": ["a"]})).is_err());
    }

    #[test]
    fn project_keeps_declared_fields_only() {
        let s = SchemaDef::new("GroupView").field("id", FieldType::Integer).field("name", FieldType::String);
        let rec = json!({"id": 1, "name": "Orcs", "secret": "x"});
        let out = s.project(rec.as_object().unwrap());
        assert_eq!(Value::Object(out), json!({"id": 1, "name": "Orcs"}));
    }
}
