// Job Handler Port
// The business logic behind a job type, invoked with the job's payload

use crate::domain::JobPayload;
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a handler while doing its work
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Shorthand for a missing required payload field
    pub fn missing_field(field: &str) -> Self {
        HandlerError::InvalidPayload(format!("missing required field '{}'", field))
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::InvalidPayload(err.to_string())
    }
}

impl From<crate::error::AppError> for HandlerError {
    fn from(err: crate::error::AppError) -> Self {
        HandlerError::Failed(err.to_string())
    }
}

/// Execution errors surfaced by the executor
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// No handler registered for the job's type (configuration error)
    #[error("No handler registered for job type '{0}'")]
    NoHandler(String),

    #[error("Handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

/// Job Handler trait
///
/// Implementations enforce their own required-field checks and return an
/// error on missing input. The queue never inspects the payload.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, payload: &JobPayload) -> Result<serde_json::Value, HandlerError>;
}
