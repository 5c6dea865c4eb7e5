// Job Executor - dispatch a claimed job to its handler
//
// Does not touch job status; the worker wraps execution with attempt and
// outcome bookkeeping.

use crate::application::registry::HandlerRegistry;
use crate::domain::Job;
use crate::port::ExecutionError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

pub struct JobExecutor {
    registry: Arc<HandlerRegistry>,
}

impl JobExecutor {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// Run the handler registered for `job.job_type`
    ///
    /// # Errors
    /// - `ExecutionError::NoHandler` if nothing is registered for the type
    /// - `ExecutionError::Handler` if the handler itself failed
    pub async fn execute(&self, job: &Job) -> Result<serde_json::Value, ExecutionError> {
        let handler = self.registry.get(job.job_type.as_str()).ok_or_else(|| {
            error!(job_id = %job.id, job_type = %job.job_type, "No handler registered");
            ExecutionError::NoHandler(job.job_type.to_string())
        })?;

        let started = Instant::now();
        let result = handler.handle(&job.payload).await?;
        debug!(
            job_id = %job.id,
            duration_ms = started.elapsed().as_millis() as u64,
            "Handler returned"
        );
        Ok(result)
    }
}
