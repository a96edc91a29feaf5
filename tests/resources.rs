mod common;

use axum::http::{Method, StatusCode};
use common::{router, send, send_with};
use cruddy::{
    hook_fn, Action, ColumnDef, FieldType, MemoryAdapter, ModelCatalog, ModelDef, Registry, Resource, SchemaDef,
    Stage,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn create_returns_single_envelope_with_links() {
    let app = router();
    let (status, body) = send(
        &app,
        Method::POST,
        "/groups",
        Some(json!({"group": {"id": "abc123", "name": "Elves Anonymous"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group"]["id"], "abc123");
    assert_eq!(body["group"]["links"]["users"], "/api/groups/abc123/users");
    assert_eq!(body["group"]["links"]["members"], "/api/groups/abc123/members");

    let (status, body) = send(&app, Method::GET, "/groups/abc123", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group"]["name"], "Elves Anonymous");
}

#[tokio::test]
async fn list_envelope_carries_meta() {
    let app = router();
    for (id, name) in [("elves", "Elves Anonymous"), ("orcs", "Orcs Anonymous")] {
        let (status, _) = send(&app, Method::POST, "/groups", Some(json!({"group": {"id": id, "name": name}}))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(&app, Method::GET, "/groups", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groups"].as_array().unwrap().len(), 2);
    assert_eq!(body["meta"], json!({"page": 1, "limit": 10, "pages": 1, "records": 2}));

    let (_, body) = send(&app, Method::GET, "/groups?limit=1&page=2&sort=name%20asc", None).await;
    assert_eq!(body["groups"][0]["id"], "orcs");
    assert_eq!(body["meta"], json!({"page": 2, "limit": 1, "pages": 2, "records": 2}));

    // where={"name":"Elves Anonymous"}
    let (status, body) = send(
        &app,
        Method::GET,
        "/groups?where=%7B%22name%22%3A%22Elves%20Anonymous%22%7D",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groups"][0]["id"], "elves");
    assert_eq!(body["meta"]["records"], 1);

    let (status, _) = send(&app, Method::GET, "/groups?where=%7B%22nope%22%3A1%7D", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn relation_setters_and_relation_routes() {
    let app = router();
    for name in ["Legolas", "Gimli"] {
        let (status, body) = send(&app, Method::POST, "/users", Some(json!({"user": {"name": name}}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["user"]["id"].is_number());
    }
    let (status, _) = send(
        &app,
        Method::POST,
        "/groups",
        Some(json!({"group": {"id": "fellowship", "name": "Fellowship", "users": [1, 2]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/groups/fellowship/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
    assert_eq!(body["users"][0]["links"]["group"], "/api/users/1/group");
    assert_eq!(body["meta"]["records"], 2);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/groups/fellowship",
        Some(json!({"group": {"users": [2]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, Method::GET, "/groups/fellowship/users", None).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert_eq!(body["users"][0]["name"], "Gimli");

    let (status, body) = send(&app, Method::GET, "/users/2/group", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group"]["id"], "fellowship");
    let (_, body) = send(&app, Method::GET, "/users/1/group", None).await;
    assert_eq!(body, json!({"group": null}));

    let (status, _) = send(&app, Method::GET, "/groups/fellowship/enemies", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_relation_setter_leaves_no_partial_write() {
    let app = router();
    let (status, body) = send(
        &app,
        Method::POST,
        "/groups",
        Some(json!({"group": {"id": "g1", "name": "G", "users": [99]}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");
    let (status, _) = send(&app, Method::GET, "/groups/g1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, Method::POST, "/users", Some(json!({"user": {"name": "Aragorn"}}))).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/groups",
        Some(json!({"group": {"id": "g1", "name": "G", "users": [1]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/groups/g1",
        Some(json!({"group": {"name": "Renamed", "users": [1, 99]}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (_, body) = send(&app, Method::GET, "/groups/g1", None).await;
    assert_eq!(body["group"]["name"], "G");
    let (_, body) = send(&app, Method::GET, "/groups/g1/users", None).await;
    assert_eq!(body["meta"]["records"], 1);
}

#[tokio::test]
async fn list_meta_follows_hook_rewritten_query() {
    let mut catalog = ModelCatalog::new();
    catalog
        .add_model(
            ModelDef::new("Tag", "tags", "id")
                .column(ColumnDef::new("id", "bigserial").not_null().with_default())
                .column(ColumnDef::new("label", "text")),
        )
        .unwrap();
    catalog.configure().unwrap();
    let tags = Resource::builder(catalog.model("Tag").unwrap())
        .adapter(Arc::new(MemoryAdapter::new()))
        .create_schema(SchemaDef::new("TagCreate").field("label", FieldType::String))
        .update_schema(SchemaDef::new("TagUpdate").optional("label", FieldType::String))
        .response_schema(
            SchemaDef::new("TagView")
                .field("id", FieldType::Integer)
                .field("label", FieldType::String),
        )
        .hook(
            Stage::Before,
            Action::GetAll,
            hook_fn(|q| {
                q["limit"] = json!(1);
                Ok(())
            }),
        )
        .build()
        .unwrap();
    let mut reg = Registry::default();
    reg.register(tags).unwrap();
    reg.finalize(&catalog).unwrap();
    let app = reg.router().unwrap();

    for label in ["a", "b", "c"] {
        let (status, _) = send(&app, Method::POST, "/tags", Some(json!({"tag": {"label": label}}))).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(&app, Method::GET, "/tags", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"], json!({"page": 1, "limit": 1, "pages": 3, "records": 3}));
}

#[tokio::test]
async fn protected_relationship_is_not_settable() {
    let app = router();
    send(&app, Method::POST, "/users", Some(json!({"user": {"name": "Frodo"}}))).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/groups",
        Some(json!({"group": {"id": "hobbits", "name": "Hobbits", "members": [1]}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group"]["links"]["members"], "/api/groups/hobbits/members");
    let (_, body) = send(&app, Method::GET, "/groups/hobbits/members", None).await;
    assert!(body["users"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn errors_map_to_statuses() {
    let app = router();
    let (status, body) = send(&app, Method::GET, "/groups/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, _) = send(&app, Method::GET, "/users/not-a-number", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::POST, "/groups", Some(json!({"name": "no envelope"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, _) = send(&app, Method::POST, "/groups", Some(json!({"group": {"name": "no id"}}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn policies_guard_operations() {
    let app = router();
    send(&app, Method::POST, "/groups", Some(json!({"group": {"id": "g", "name": "G"}}))).await;
    let (status, body) = send(&app, Method::DELETE, "/groups/g", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, body) = send_with(&app, Method::DELETE, "/groups/g", None, &[("x-session", "s1")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group"]["id"], "g");
    let (status, _) = send(&app, Method::GET, "/groups/g", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disabled_operations_are_not_mounted() {
    let app = router();
    send(&app, Method::POST, "/users", Some(json!({"user": {"name": "Sam"}}))).await;
    let (status, _) = send(&app, Method::DELETE, "/users/1", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn controller_extension_routes_are_served() {
    let app = router();
    send(&app, Method::POST, "/groups", Some(json!({"group": {"id": "a", "name": "A"}}))).await;
    let (status, body) = send(&app, Method::GET, "/groups/count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"count": 1}));
}

#[tokio::test]
async fn openapi_lists_synthesized_components() {
    let app = router();
    let (status, body) = send(&app, Method::GET, "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    let schemas = &body["components"]["schemas"];
    for name in [
        "GroupCreateEnvelope",
        "GroupCreateProxy",
        "GroupViewEnvelope",
        "GroupViewList",
        "groupLinks",
        "UserViewLinked",
    ] {
        assert!(schemas.get(name).is_some(), "missing component {}", name);
    }
    assert!(schemas["GroupCreateProxy"]["properties"].get("users").is_some());
    assert!(schemas["GroupCreateProxy"]["properties"].get("members").is_none());
    assert!(body["paths"].get("/groups/{id}").is_some());
}
