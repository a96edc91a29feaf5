//! Response helpers for generated routes.

use crate::query::Meta;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

/// 200 with a JSON body. Creates also answer 200.
pub fn ok<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

pub fn meta_value(meta: &Meta) -> Value {
    json!({
        "page": meta.page,
        "limit": meta.limit,
        "pages": meta.pages,
        "records": meta.records,
    })
}

pub fn error_body(code: &str, message: String, details: Option<Value>) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}
