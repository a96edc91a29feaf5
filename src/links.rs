//! Relationship link URLs: `{prefix}{path}/{id}/{relationship}`.

use crate::id::{id_to_path_segment, normalize_uuid, IdType};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct LinkBuilder {
    prefix: String,
    path: String,
    id_type: IdType,
    relations: Vec<String>,
}

impl LinkBuilder {
    pub fn new(prefix: impl Into<String>, path: impl Into<String>, id_type: IdType, relations: Vec<String>) -> Self {
        LinkBuilder {
            prefix: prefix.into(),
            path: path.into(),
            id_type,
            relations,
        }
    }

    pub fn relations(&self) -> &[String] {
        &self.relations
    }

    /// Map every relationship name to its nested collection URL for the record `id`.
    ///
    /// Raw rows may carry uuid keys as undashed hex strings; those are dashed first.
    pub fn build(&self, id: &Value) -> BTreeMap<String, String> {
        let mut segment = id_to_path_segment(id);
        if self.id_type == IdType::Uuid && id.is_string() {
            segment = normalize_uuid(&segment);
        }
        self.relations
            .iter()
            .map(|rel| (rel.clone(), format!("{}{}/{}/{}", self.prefix, self.path, segment, rel)))
            .collect()
    }
}
