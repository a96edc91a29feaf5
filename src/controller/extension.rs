use crate::controller::ResourceContext;
use axum::Router;
use std::sync::Arc;

/// Adds custom routes to a resource before its standard CRUD routes are attached.
///
/// Routes are absolute (use [`ResourceContext::route_path`]) and share the resource's
/// state. They must not repeat a method on a path the standard routes also serve.
pub trait ControllerExtension: Send + Sync {
    fn extend(&self, router: Router<Arc<ResourceContext>>, ctx: &ResourceContext) -> Router<Arc<ResourceContext>>;
}

impl<F> ControllerExtension for F
where
    F: Fn(Router<Arc<ResourceContext>>, &ResourceContext) -> Router<Arc<ResourceContext>> + Send + Sync,
{
    fn extend(&self, router: Router<Arc<ResourceContext>>, ctx: &ResourceContext) -> Router<Arc<ResourceContext>> {
        self(router, ctx)
    }
}
