//! Access policies evaluated before each generated route runs.

use crate::error::AppError;
use async_trait::async_trait;
use axum::http::{HeaderMap, Method, Uri};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Standard operations of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    GetOne,
    GetMany,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Update,
        Operation::Delete,
        Operation::GetOne,
        Operation::GetMany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::GetOne => "get_one",
            Operation::GetMany => "get_many",
        }
    }
}

/// What a policy can see of the incoming request.
#[derive(Debug)]
pub struct PolicyRequest<'a> {
    pub operation: Operation,
    /// Singular resource name, e.g. "group".
    pub resource: &'a str,
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
}

#[async_trait]
pub trait Policy: Send + Sync {
    /// Return an error (usually Unauthorized or Forbidden) to reject the request.
    async fn check(&self, req: &PolicyRequest<'_>) -> Result<(), AppError>;
}

struct FnPolicy<F>(F);

#[async_trait]
impl<F> Policy for FnPolicy<F>
where
    F: Fn(&PolicyRequest<'_>) -> Result<(), AppError> + Send + Sync,
{
    async fn check(&self, req: &PolicyRequest<'_>) -> Result<(), AppError> {
        (self.0)(req)
    }
}

/// Wrap a synchronous closure as a policy.
pub fn policy_fn<F>(f: F) -> Arc<dyn Policy>
where
    F: Fn(&PolicyRequest<'_>) -> Result<(), AppError> + Send + Sync + 'static,
{
    Arc::new(FnPolicy(f))
}

/// Universal policies plus per-operation lists.
#[derive(Clone, Default)]
pub struct Policies {
    universal: Vec<Arc<dyn Policy>>,
    by_operation: HashMap<Operation, Vec<Arc<dyn Policy>>>,
}

impl fmt::Debug for Policies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self.by_operation.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("Policies")
            .field("universal", &self.universal.len())
            .field("by_operation", &counts)
            .finish()
    }
}

impl Policies {
    pub fn add_universal(&mut self, policy: Arc<dyn Policy>) {
        self.universal.push(policy);
    }

    pub fn add(&mut self, operation: Operation, policy: Arc<dyn Policy>) {
        self.by_operation.entry(operation).or_default().push(policy);
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.universal.len() + self.by_operation.get(&operation).map(Vec::len).unwrap_or(0)
    }

    /// Run universal policies, then the operation's own, stopping at the first rejection.
    pub async fn enforce(&self, req: &PolicyRequest<'_>) -> Result<(), AppError> {
        for p in &self.universal {
            p.check(req).await?;
        }
        if let Some(list) = self.by_operation.get(&req.operation) {
            for p in list {
                p.check(req).await?;
            }
        }
        Ok(())
    }
}
