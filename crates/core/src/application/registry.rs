// Handler Registry - job type name -> handler
//
// Built once at startup, then shared read-only (Arc) with every worker.

use crate::domain::JobPayload;
use crate::port::{HandlerError, JobHandler};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Process-local mapping from job type to handler
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a job type.
    ///
    /// A second registration for the same type replaces the first. That is a
    /// startup programming error, so it is logged loudly.
    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let job_type = job_type.into();
        if self.handlers.insert(job_type.clone(), handler).is_some() {
            warn!(job_type = %job_type, "Handler registered twice, last registration wins");
        } else {
            info!(job_type = %job_type, "Handler registered");
        }
    }

    /// Register an async closure as a handler
    ///
    /// # Example
    /// ```text
    /// registry.register_fn("echo", |payload| async move {
    ///     Ok(payload.as_value().clone())
    /// });
    /// ```
    pub fn register_fn<F, Fut>(&mut self, job_type: impl Into<String>, f: F)
    where
        F: Fn(JobPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, HandlerError>> + Send + 'static,
    {
        self.register(job_type, Arc::new(FnHandler(f)));
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    /// Registered job types, sorted (for diagnostics)
    pub fn registered_handlers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobPayload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: &JobPayload) -> Result<serde_json::Value, HandlerError> {
        (self.0)(payload.clone()).await
    }
}
