//! Id-value types for resource primary keys.

use crate::error::AppError;
use crate::schema::FieldType;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Primary key value type of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdType {
    Int,
    Str,
    Uuid,
}

impl IdType {
    /// Infer from a column type name (e.g. "uuid", "bigserial", "text").
    pub fn infer(column_type: &str) -> IdType {
        let lower = column_type.to_lowercase();
        if lower.contains("uuid") {
            IdType::Uuid
        } else if lower.contains("serial") || lower.contains("int") {
            IdType::Int
        } else {
            IdType::Str
        }
    }

    /// Parse an id taken from a URL path segment.
    pub fn parse_path(&self, id_str: &str) -> Result<Value, AppError> {
        Ok(match self {
            IdType::Uuid => {
                let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
                Value::String(u.to_string())
            }
            IdType::Int => {
                let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
                Value::Number(n.into())
            }
            IdType::Str => Value::String(id_str.to_string()),
        })
    }

    /// Whether a JSON value is an acceptable id of this type.
    pub fn accepts(&self, v: &Value) -> bool {
        match self {
            IdType::Int => v.as_i64().is_some(),
            IdType::Str => v.is_string(),
            IdType::Uuid => v.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            IdType::Int => FieldType::Integer,
            IdType::Str => FieldType::String,
            IdType::Uuid => FieldType::Uuid,
        }
    }
}

// None only if the pattern fails to compile; ids are then left as given.
fn undashed_uuid() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\S{8})(\S{4})(\S{4})(\S{4})(.*)").ok())
        .as_ref()
}

/// Dash an unformatted 32-char hex uuid ("0f8f...") into 8-4-4-4-12 form. Dashed input passes through.
pub fn normalize_uuid(id: &str) -> String {
    if id.contains('-') {
        return id.to_string();
    }
    match undashed_uuid() {
        Some(re) => re.replace(id, "$1-$2-$3-$4-$5").into_owned(),
        None => id.to_string(),
    }
}

/// Render an id value for use in a URL path.
pub fn id_to_path_segment(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn infers_from_column_type() {
        assert_eq!(IdType::infer("uuid"), IdType::Uuid);
        assert_eq!(IdType::infer("BIGSERIAL"), IdType::Int);
        assert_eq!(IdType::infer("integer"), IdType::Int);
        assert_eq!(IdType::infer("varchar(64)"), IdType::Str);
    }

    #[test]
    fn parses_path_ids() {
        assert_eq!(IdType::Int.parse_path("42").unwrap(), json!(42));
        assert!(IdType::Int.parse_path("abc").is_err());
        assert!(IdType::Uuid.parse_path("not-a-uuid").is_err());
        assert_eq!(IdType::Str.parse_path("abc123").unwrap(), json!("abc123"));
    }

    #[test]
    fn normalizes_undashed_uuid() {
        assert!(undashed_uuid().is_some());
        assert_eq!(
            normalize_uuid("0f8fad5bd9cb469fa16570867728950e"),
            "0f8fad5b-d9cb-469f-a165-70867728950e"
        );
        assert_eq!(
            normalize_uuid("0f8fad5b-d9cb-469f-a165-70867728950e"),
            "0f8fad5b-d9cb-469f-a165-70867728950e"
        );
    }
}
