use crate::id::IdType;
use crate::model::{Cardinality, RelationshipDescriptor};

/// What a relationship needs to know about the resource on its far side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignResource {
    pub model: String,
    pub path: String,
    pub id_type: IdType,
}

/// One relationship edge from a resource to another registered resource.
#[derive(Clone, Debug)]
pub struct RelationshipConfig {
    pub name: String,
    pub cardinality: Cardinality,
    pub descriptor: RelationshipDescriptor,
    pub foreign: ForeignResource,
}

impl RelationshipConfig {
    pub fn new(descriptor: RelationshipDescriptor, foreign: ForeignResource) -> Self {
        RelationshipConfig {
            name: descriptor.name.clone(),
            cardinality: descriptor.cardinality,
            descriptor,
            foreign,
        }
    }

    pub fn is_to_many(&self) -> bool {
        self.cardinality.is_to_many()
    }
}
