//! Before/after hooks around repository operations.

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Before,
    After,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
    GetOne,
    GetAll,
    SetRelations,
}

/// A hook receives the operation payload and may rewrite it in place.
///
/// Before-hooks see the input (create/update body, id, list query, relation ids);
/// after-hooks see the result (record, list of rows, relation ids).
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    async fn call(&self, data: &mut Value) -> Result<(), AppError>;
}

struct FnHook<F>(F);

#[async_trait]
impl<F> LifecycleHook for FnHook<F>
where
    F: Fn(&mut Value) -> Result<(), AppError> + Send + Sync,
{
    async fn call(&self, data: &mut Value) -> Result<(), AppError> {
        (self.0)(data)
    }
}

/// Wrap a synchronous closure as a hook.
pub fn hook_fn<F>(f: F) -> Arc<dyn LifecycleHook>
where
    F: Fn(&mut Value) -> Result<(), AppError> + Send + Sync + 'static,
{
    Arc::new(FnHook(f))
}

#[derive(Clone, Default)]
pub struct Lifecycle {
    hooks: HashMap<(Stage, Action), Arc<dyn LifecycleHook>>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Lifecycle {
    /// Set the hook for one slot. A later call for the same slot replaces it.
    pub fn set(&mut self, stage: Stage, action: Action, hook: Arc<dyn LifecycleHook>) {
        self.hooks.insert((stage, action), hook);
    }

    pub fn has(&self, stage: Stage, action: Action) -> bool {
        self.hooks.contains_key(&(stage, action))
    }

    pub async fn run(&self, stage: Stage, action: Action, data: &mut Value) -> Result<(), AppError> {
        if let Some(hook) = self.hooks.get(&(stage, action)) {
            tracing::debug!(?stage, ?action, "lifecycle hook");
            hook.call(data).await?;
        }
        Ok(())
    }
}
