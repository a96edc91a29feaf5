//! Derives the per-resource schema set from the base schemas and the relationship map.

use crate::inflector;
use crate::links::LinkBuilder;
use crate::resource::RelationshipConfig;
use crate::schema::{
    FieldDef, FieldType, LinkedRecordBuilder, ManyEnvelope, RequestEnvelope, SchemaDef, SingleEnvelope,
};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Link schema of a resource: URL fields for every relationship, plus the relation setters
/// accepted on create/update.
#[derive(Clone, Debug)]
pub struct LinkSchema {
    pub links: SchemaDef,
    pub setters: Vec<FieldDef>,
}

impl LinkSchema {
    pub fn setter_names(&self) -> Vec<String> {
        self.setters.iter().map(|f| f.name.clone()).collect()
    }
}

/// Everything synthesized for one resource during resolution. Immutable afterwards.
#[derive(Clone, Debug)]
pub struct SchemaSet {
    pub single_name: String,
    pub plural_name: String,
    pub link: LinkSchema,
    pub create_proxy: SchemaDef,
    pub update_proxy: SchemaDef,
    pub create: RequestEnvelope,
    pub update: RequestEnvelope,
    pub single_linked: SchemaDef,
    pub single: SingleEnvelope,
    pub many: ManyEnvelope,
    pub meta: SchemaDef,
}

pub struct SynthesisInput<'a> {
    /// Model type name, e.g. "Group".
    pub model_name: &'a str,
    pub create: &'a SchemaDef,
    pub update: &'a SchemaDef,
    pub response: &'a SchemaDef,
    pub meta: &'a SchemaDef,
    pub relations: &'a [RelationshipConfig],
    pub protected: &'a BTreeSet<String>,
    pub link_prefix: &'a str,
    pub path: &'a str,
    pub primary_key: &'a str,
    pub id_type: crate::id::IdType,
}

pub fn synthesize(input: SynthesisInput<'_>) -> SchemaSet {
    let single_name = input.model_name.to_lowercase();
    let plural_name = inflector::plural(&single_name);

    let mut links = SchemaDef::new(format!("{}Links", single_name));
    let mut setters = Vec::new();
    for rel in input.relations {
        links = links.field(rel.name.clone(), FieldType::String);
        if rel.is_to_many() && !input.protected.contains(&rel.name) {
            setters.push(FieldDef::optional(
                rel.name.clone(),
                FieldType::List(Box::new(rel.foreign.id_type.field_type())),
            ));
        }
    }
    for name in input.protected {
        if !input.relations.iter().any(|r| &r.name == name) {
            tracing::warn!(model = input.model_name, relationship = %name, "protected relationship is not a relationship of this model");
        }
    }
    let link = LinkSchema { links, setters };
    let setter_names = link.setter_names();

    let create_proxy = input
        .create
        .extend(format!("{}Proxy", input.create.name), link.setters.clone());
    let update_proxy = input
        .update
        .extend(format!("{}Proxy", input.update.name), link.setters.clone());
    let create = RequestEnvelope::new(
        format!("{}Envelope", input.create.name),
        single_name.clone(),
        create_proxy.clone(),
        setter_names.clone(),
    );
    let update = RequestEnvelope::new(
        format!("{}Envelope", input.update.name),
        single_name.clone(),
        update_proxy.clone(),
        setter_names,
    );

    let single_linked = input.response.extend(
        format!("{}Linked", input.response.name),
        [FieldDef::optional("links", FieldType::Object(Box::new(link.links.clone())))],
    );
    let builder = LinkBuilder::new(
        input.link_prefix,
        input.path,
        input.id_type,
        input.relations.iter().map(|r| r.name.clone()).collect(),
    );
    let linked = Arc::new(LinkedRecordBuilder::new(
        input.response.clone(),
        builder,
        input.primary_key,
    ));
    let single = SingleEnvelope::new(
        format!("{}Envelope", input.response.name),
        single_name.clone(),
        linked.clone(),
    );
    let many = ManyEnvelope::new(format!("{}List", input.response.name), plural_name.clone(), linked);

    tracing::debug!(
        model = input.model_name,
        relations = input.relations.len(),
        setters = link.setters.len(),
        "schemas synthesized"
    );

    SchemaSet {
        single_name,
        plural_name,
        link,
        create_proxy,
        update_proxy,
        create,
        update,
        single_linked,
        single,
        many,
        meta: input.meta.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::IdType;
    use crate::model::{Cardinality, ColumnDef, ModelDef, RelationshipDescriptor};
    use crate::resource::ForeignResource;
    use crate::schema::{meta_object_schema, EnvelopeInput};
    use serde_json::json;

    fn rel(name: &str, cardinality: Cardinality, target: &str, id_type: IdType) -> RelationshipConfig {
        let target_model = Arc::new(
            ModelDef::new(target, inflector::plural(&target.to_lowercase()), "id").column(ColumnDef::new("id", "text")),
        );
        RelationshipConfig::new(
            RelationshipDescriptor {
                name: name.into(),
                cardinality,
                target: target_model,
                local_column: "id".into(),
                remote_column: "group_id".into(),
                secondary: None,
            },
            ForeignResource {
                model: target.into(),
                path: format!("/{}", name),
                id_type,
            },
        )
    }

    fn schemas(protected: &[&str]) -> SchemaSet {
        let create = SchemaDef::new("GroupCreate").field("name", FieldType::String);
        let update = SchemaDef::new("GroupUpdate").optional("name", FieldType::String);
        let response = SchemaDef::new("GroupView")
            .field("id", FieldType::String)
            .field("name", FieldType::String);
        let meta = meta_object_schema();
        let relations = vec![
            rel("users", Cardinality::OneToMany, "User", IdType::Int),
            rel("admins", Cardinality::ManyToMany, "User", IdType::Int),
            rel("owner", Cardinality::ManyToOne, "User", IdType::Int),
        ];
        let protected: BTreeSet<String> = protected.iter().map(|s| s.to_string()).collect();
        synthesize(SynthesisInput {
            model_name: "Group",
            create: &create,
            update: &update,
            response: &response,
            meta: &meta,
            relations: &relations,
            protected: &protected,
            link_prefix: "/api",
            path: "/groups",
            primary_key: "id",
            id_type: IdType::Str,
        })
    }

    #[test]
    fn names_follow_model_and_base_schemas() {
        let s = schemas(&[]);
        assert_eq!(s.single_name, "group");
        assert_eq!(s.plural_name, "groups");
        assert_eq!(s.link.links.name, "groupLinks");
        assert_eq!(s.create_proxy.name, "GroupCreateProxy");
        assert_eq!(s.update.name(), "GroupUpdateEnvelope");
        assert_eq!(s.single_linked.name, "GroupViewLinked");
        assert_eq!(s.single.name(), "GroupViewEnvelope");
        assert_eq!(s.many.name(), "GroupViewList");
        assert_eq!(s.many.key(), "groups");
    }

    #[test]
    fn only_to_many_relations_get_setters() {
        let s = schemas(&[]);
        assert_eq!(s.link.links.fields.len(), 3);
        assert_eq!(s.link.setter_names(), vec!["users", "admins"]);
        let users = s.create_proxy.get("users").unwrap();
        assert!(!users.required);
        assert_eq!(users.ty, FieldType::List(Box::new(FieldType::Integer)));
        assert!(!s.update_proxy.has_field("owner"));
    }

    #[test]
    fn protected_relationships_stay_linked_but_not_settable() {
        let s = schemas(&["users"]);
        assert!(s.link.links.has_field("users"));
        assert!(!s.create_proxy.has_field("users"));
        assert!(!s.update_proxy.has_field("users"));
        assert!(s.create_proxy.has_field("admins"));
        let p = s.create.parse(&json!({"group": {"name": "Elves", "users": [1]}})).unwrap();
        assert!(p.relations.is_empty());
    }

    #[test]
    fn single_envelope_links_every_relationship() {
        let s = schemas(&[]);
        let out = s.single.build(EnvelopeInput::FromRaw(json!({"id": "abc123", "name": "Elves"})));
        let rec = out.record.unwrap();
        assert_eq!(rec["links"]["users"], json!("/api/groups/abc123/users"));
        assert_eq!(rec["links"]["owner"], json!("/api/groups/abc123/owner"));
    }
}
