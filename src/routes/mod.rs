mod common;

pub use common::{common_routes, common_routes_with_ready};

use crate::adapter::Adapter;
use crate::config::ServerConfig;
use crate::error::ConfigError;
use crate::registry::Registry;
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

/// The full application: resource routes, `/openapi.json`, and the common routes, with the
/// configured request body limit. `adapter` backs the readiness check.
pub fn app(registry: &Registry, adapter: Arc<dyn Adapter>, config: &ServerConfig) -> Result<Router, ConfigError> {
    Ok(registry
        .router()?
        .merge(common_routes_with_ready(adapter))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(config.max_body_bytes))))
}
