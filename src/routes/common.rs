//! Common routes: health, readiness, version.

use crate::adapter::Adapter;
use crate::response::error_body;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    storage: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

async fn ready(State(adapter): State<Arc<dyn Adapter>>) -> Result<Json<ReadyBody>, (StatusCode, Json<Value>)> {
    if let Err(e) = adapter.ping().await {
        tracing::warn!(adapter = adapter.kind(), error = %e, "readiness check failed");
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(error_body("unavailable", format!("{} storage unavailable", adapter.kind()), None)),
        ));
    }
    Ok(Json(ReadyBody {
        status: "ok",
        storage: adapter.kind(),
    }))
}

async fn version() -> Json<Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Common routes (no state): GET /health, GET /version.
pub fn common_routes() -> Router {
    Router::new().route("/health", get(health)).route("/version", get(version))
}

/// Common routes plus GET /ready, which pings `adapter`.
pub fn common_routes_with_ready(adapter: Arc<dyn Adapter>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(adapter)
}
