// Enqueue Use Case

use crate::domain::{Job, JobId, JobPayload, JobPriority, JobType, DEFAULT_MAX_ATTEMPTS};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobRepository, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_JOB_TYPE_LEN: usize = 128;
const MAX_TENANT_ID_LEN: usize = 128;
const MAX_PAYLOAD_DEPTH: usize = 32;

/// Enqueue request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub tenant_id: String,
    pub job_type: String,
    pub payload: serde_json::Value,

    /// Defaults to `medium`
    #[serde(default)]
    pub priority: Option<JobPriority>,

    /// Defaults to 3, must be >= 1
    #[serde(default)]
    pub max_attempts: Option<i32>,
}

impl EnqueueRequest {
    pub fn new(
        tenant_id: impl Into<String>,
        job_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            job_type: job_type.into(),
            payload,
            priority: None,
            max_attempts: None,
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Validate an enqueue request before anything touches the store.
///
/// The handler does not need to be registered yet; only the shape of the
/// request is checked.
pub fn validate_request(req: &EnqueueRequest) -> Result<()> {
    if req.tenant_id.trim().is_empty() {
        return Err(AppError::Validation("tenant_id cannot be empty".into()));
    }
    if req.tenant_id.len() > MAX_TENANT_ID_LEN {
        return Err(AppError::Validation(format!(
            "tenant_id too long (max {} characters)",
            MAX_TENANT_ID_LEN
        )));
    }
    if req.job_type.trim().is_empty() {
        return Err(AppError::Validation("job_type cannot be empty".into()));
    }
    if req.job_type.len() > MAX_JOB_TYPE_LEN {
        return Err(AppError::Validation(format!(
            "job_type too long (max {} characters)",
            MAX_JOB_TYPE_LEN
        )));
    }
    if let Some(max_attempts) = req.max_attempts {
        if max_attempts < 1 {
            return Err(AppError::Validation(format!(
                "max_attempts must be at least 1, got {}",
                max_attempts
            )));
        }
    }
    if json_depth(&req.payload) > MAX_PAYLOAD_DEPTH {
        return Err(AppError::Validation(format!(
            "payload is too deeply nested (max depth {})",
            MAX_PAYLOAD_DEPTH
        )));
    }
    Ok(())
}

fn json_depth(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        serde_json::Value::Object(map) => 1 + map.values().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Execute enqueue use case
///
/// The row is durably inserted as PENDING before this returns. Nothing is
/// executed here.
///
/// # Arguments
///
/// * `job_repo` - Job repository
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Enqueue request
pub async fn execute(
    job_repo: &dyn JobRepository,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: EnqueueRequest,
) -> Result<JobId> {
    validate_request(&req)?;

    let job_id = id_provider.generate_id();
    let created_at = time_provider.now_millis();

    let mut job = Job::new(
        job_id.clone(),
        created_at,
        req.tenant_id,
        JobType::new(req.job_type),
        JobPayload::new(req.payload),
    );
    job.priority = req.priority.unwrap_or_default();
    job.max_attempts = req.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);

    job_repo.insert(&job).await?;

    info!(
        job_id = %job.id,
        job_type = %job.job_type,
        priority = %job.priority,
        tenant_id = %job.tenant_id,
        "Job enqueued"
    );

    Ok(job_id)
}
