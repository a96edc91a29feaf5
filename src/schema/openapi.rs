//! OpenAPI rendering of synthesized schema sets.

use crate::id::IdType;
use crate::policy::Operation;
use crate::schema::{FieldType, SchemaDef, SchemaSet};
use utoipa::openapi::{
    content::ContentBuilder,
    path::{HttpMethod, OperationBuilder, ParameterBuilder, ParameterIn, PathItem, PathItemBuilder},
    request_body::RequestBodyBuilder,
    response::ResponseBuilder,
    schema::{ArrayBuilder, KnownFormat, ObjectBuilder, Schema, SchemaFormat, SchemaType, Type},
    Ref, RefOr, Required,
};

type SchemaCollection = Vec<(String, RefOr<Schema>)>;

fn typed(ty: Type) -> ObjectBuilder {
    ObjectBuilder::new().schema_type(SchemaType::Type(ty))
}

fn field_schema(ty: &FieldType) -> RefOr<Schema> {
    match ty {
        FieldType::Integer => Schema::Object(typed(Type::Integer).build()).into(),
        FieldType::Number => Schema::Object(typed(Type::Number).build()).into(),
        FieldType::Boolean => Schema::Object(typed(Type::Boolean).build()).into(),
        FieldType::String => Schema::Object(typed(Type::String).build()).into(),
        FieldType::Uuid => Schema::Object(
            typed(Type::String)
                .format(Some(SchemaFormat::KnownFormat(KnownFormat::Uuid)))
                .build(),
        )
        .into(),
        FieldType::Timestamp => Schema::Object(
            typed(Type::String)
                .format(Some(SchemaFormat::KnownFormat(KnownFormat::DateTime)))
                .build(),
        )
        .into(),
        FieldType::Json => Schema::Object(ObjectBuilder::new().schema_type(SchemaType::AnyValue).build()).into(),
        FieldType::List(inner) => Schema::Array(ArrayBuilder::new().items(field_schema(inner)).build()).into(),
        FieldType::Object(def) => RefOr::Ref(Ref::from_schema_name(def.name.clone())),
    }
}

fn object_schema(def: &SchemaDef) -> RefOr<Schema> {
    let mut obj = typed(Type::Object).title(Some(def.name.clone()));
    for f in &def.fields {
        obj = obj.property(f.name.clone(), field_schema(&f.ty));
        if f.required {
            obj = obj.required(f.name.clone());
        }
    }
    RefOr::T(Schema::Object(obj.build()))
}

fn reference(name: &str) -> RefOr<Schema> {
    RefOr::Ref(Ref::from_schema_name(name))
}

/// `{ key: <ref> }`
fn envelope_schema(key: &str, inner: RefOr<Schema>, required: bool) -> RefOr<Schema> {
    let mut obj = typed(Type::Object).property(key, inner);
    if required {
        obj = obj.required(key);
    }
    RefOr::T(Schema::Object(obj.build()))
}

impl SchemaSet {
    /// Component schemas contributed by this resource.
    pub fn components(&self) -> SchemaCollection {
        let mut out: SchemaCollection = vec![
            (self.link.links.name.clone(), object_schema(&self.link.links)),
            (self.create_proxy.name.clone(), object_schema(&self.create_proxy)),
            (self.update_proxy.name.clone(), object_schema(&self.update_proxy)),
            (self.single_linked.name.clone(), object_schema(&self.single_linked)),
            (self.meta.name.clone(), object_schema(&self.meta)),
        ];
        out.push((
            self.create.name().to_string(),
            envelope_schema(&self.single_name, reference(&self.create_proxy.name), true),
        ));
        out.push((
            self.update.name().to_string(),
            envelope_schema(&self.single_name, reference(&self.update_proxy.name), true),
        ));
        out.push((
            self.single.name().to_string(),
            envelope_schema(&self.single_name, reference(&self.single_linked.name), false),
        ));
        let list = typed(Type::Object)
            .property(
                self.plural_name.clone(),
                Schema::Array(ArrayBuilder::new().items(reference(&self.single_linked.name)).build()),
            )
            .property("meta", reference(&self.meta.name))
            .required("meta");
        out.push((self.many.name().to_string(), RefOr::T(Schema::Object(list.build()))));
        out
    }

    /// Path items for the generated routes of a resource mounted at `path`.
    pub fn paths(
        &self,
        path: &str,
        tags: &[String],
        id_type: IdType,
        enabled: impl Fn(Operation) -> bool,
    ) -> Vec<(String, PathItem)> {
        let op = |id: String, summary: String, response: &str| {
            let content = ContentBuilder::new().schema(Some(reference(response))).build();
            OperationBuilder::new()
                .tags(Some(tags.to_vec()))
                .operation_id(Some(id))
                .summary(Some(summary))
                .response(
                    "200",
                    ResponseBuilder::new()
                        .description("Successful Response")
                        .content("application/json", content)
                        .build(),
                )
        };
        let body = |name: &str| {
            RequestBodyBuilder::new()
                .content("application/json", ContentBuilder::new().schema(Some(reference(name))).build())
                .required(Some(Required::True))
                .build()
        };
        let id_param = ParameterBuilder::new()
            .name("id")
            .parameter_in(ParameterIn::Path)
            .required(Required::True)
            .schema(Some(field_schema(&id_type.field_type())))
            .build();

        let mut collection = PathItemBuilder::new();
        let mut item = PathItemBuilder::new();
        let (single, plural) = (&self.single_name, &self.plural_name);
        if enabled(Operation::GetMany) {
            collection = collection.operation(
                HttpMethod::Get,
                op(format!("get_many_{}", plural), format!("List {}", plural), self.many.name()).build(),
            );
        }
        if enabled(Operation::Create) {
            collection = collection.operation(
                HttpMethod::Post,
                op(format!("create_{}", single), format!("Create a {}", single), self.single.name())
                    .request_body(Some(body(self.create.name())))
                    .build(),
            );
        }
        if enabled(Operation::GetOne) {
            item = item.operation(
                HttpMethod::Get,
                op(format!("get_{}", single), format!("Get a {}", single), self.single.name())
                    .parameter(id_param.clone())
                    .build(),
            );
        }
        if enabled(Operation::Update) {
            item = item.operation(
                HttpMethod::Patch,
                op(format!("update_{}", single), format!("Update a {}", single), self.single.name())
                    .parameter(id_param.clone())
                    .request_body(Some(body(self.update.name())))
                    .build(),
            );
        }
        if enabled(Operation::Delete) {
            item = item.operation(
                HttpMethod::Delete,
                op(format!("delete_{}", single), format!("Delete a {}", single), self.single.name())
                    .parameter(id_param)
                    .build(),
            );
        }
        vec![(path.to_string(), collection.build()), (format!("{}/{{id}}", path), item.build())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::meta_object_schema;

    #[test]
    fn object_schema_marks_required_fields() {
        let def = SchemaDef::new("GroupCreate")
            .field("name", FieldType::String)
            .optional("users", FieldType::List(Box::new(FieldType::Integer)));
        let v = serde_json::to_value(object_schema(&def)).unwrap();
        assert_eq!(v["required"], serde_json::json!(["name"]));
        assert_eq!(v["properties"]["users"]["type"], "array");
        assert_eq!(v["properties"]["users"]["items"]["type"], "integer");
    }

    #[test]
    fn meta_schema_renders_integers() {
        let v = serde_json::to_value(object_schema(&meta_object_schema())).unwrap();
        assert_eq!(v["properties"]["pages"]["type"], "integer");
        assert_eq!(v["required"].as_array().unwrap().len(), 4);
    }
}
