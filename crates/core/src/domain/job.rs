// Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Owning tenant (opaque scoping key, only used for listing)
pub type TenantId = String;

/// Retry ceiling applied when the caller does not supply one
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Job Status
///
/// `PENDING -> PROCESSING -> COMPLETED | FAILED`, and `FAILED -> PENDING`
/// through the retry paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Terminal states are eligible for reaping
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

/// Priority class, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl JobPriority {
    /// Strict precedence used by every claim
    pub const CLAIM_ORDER: [JobPriority; 3] =
        [JobPriority::High, JobPriority::Medium, JobPriority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::High => "high",
            JobPriority::Medium => "medium",
            JobPriority::Low => "low",
        }
    }
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobPriority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "high" => Ok(JobPriority::High),
            "medium" => Ok(JobPriority::Medium),
            "low" => Ok(JobPriority::Low),
            _ => Err(DomainError::InvalidPriority(s.to_string())),
        }
    }
}

/// Job Type (names the handler to invoke)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobType(String);

impl JobType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job Payload (opaque to the queue, passed verbatim to the handler)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Look up a top-level string field
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }
}

/// Terminal outcome of one execution attempt.
///
/// A completed job always carries a result and a failed job always carries
/// an error message; the store clears the other column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOutcome {
    Completed(serde_json::Value),
    Failed(String),
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed(_) => JobStatus::Completed,
            JobOutcome::Failed(_) => JobStatus::Failed,
        }
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: JobPriority,

    pub payload: JobPayload,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,

    pub attempts: i32,
    pub max_attempts: i32,

    pub created_at: i64, // epoch ms
    pub updated_at: i64,
    pub completed_at: Option<i64>,
}

impl Job {
    /// Create a new PENDING job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `tenant_id` - Owning tenant
    /// * `job_type` - Handler name
    /// * `payload` - Job payload
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        tenant_id: impl Into<String>,
        job_type: JobType,
        payload: JobPayload,
    ) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            job_type,
            status: JobStatus::Pending,
            priority: JobPriority::default(),
            payload,
            result: None,
            error: None,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            created_at,
            updated_at: created_at,
            completed_at: None,
        }
    }

    /// Create a test job with deterministic ID and timestamp.
    ///
    /// Uses a simple counter for deterministic test IDs (test-1, test-2, ...).
    /// Timestamps start at 1000 and increment by 1000.
    ///
    /// **Note**: This method should only be used in tests. For production code,
    /// always inject ID and time via providers.
    pub fn new_test(tenant_id: impl Into<String>, job_type: JobType, payload: JobPayload) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = format!("test-{}", counter);
        let created_at = (counter * 1000) as i64;

        Self::new(id, created_at, tenant_id, job_type, payload)
    }

    /// True once the retry budget is spent
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Apply an outcome in memory (mirrors the store update)
    pub fn finish(&mut self, outcome: JobOutcome, now_millis: i64) -> Result<()> {
        let target = outcome.status();
        if self.status != JobStatus::Processing && self.status != target {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        if self.status != target {
            self.completed_at = Some(now_millis);
        }
        match outcome {
            JobOutcome::Completed(value) => {
                self.result = Some(value);
                self.error = None;
            }
            JobOutcome::Failed(message) => {
                self.result = None;
                self.error = Some(message);
            }
        }
        self.status = target;
        self.updated_at = now_millis;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn processing_job() -> Job {
        let mut job = Job::new_test("tenant-a", JobType::new("email_sending"), JobPayload::new(json!({})));
        job.status = JobStatus::Processing;
        job
    }

    #[test]
    fn test_new_job_defaults() {
        let job = Job::new("id-1", 42, "tenant-a", JobType::new("x"), JobPayload::new(json!({})));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, JobPriority::Medium);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(job.updated_at, 42);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in JobStatus::ALL {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_priority_parsing_is_case_insensitive() {
        assert_eq!("HIGH".parse::<JobPriority>().unwrap(), JobPriority::High);
        assert_eq!("low".parse::<JobPriority>().unwrap(), JobPriority::Low);
        assert!("urgent".parse::<JobPriority>().is_err());
    }

    #[test]
    fn test_priority_serde_is_lowercase() {
        assert_eq!(serde_json::to_value(JobPriority::High).unwrap(), json!("high"));
        let parsed: JobPriority = serde_json::from_value(json!("medium")).unwrap();
        assert_eq!(parsed, JobPriority::Medium);
    }

    #[test]
    fn test_finish_completed_clears_error() {
        let mut job = processing_job();
        job.error = Some("old".into());
        job.finish(JobOutcome::Completed(json!({"ok": true})), 5000).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
        assert_eq!(job.result, Some(json!({"ok": true})));
        assert_eq!(job.completed_at, Some(5000));
    }

    #[test]
    fn test_finish_failed_clears_result() {
        let mut job = processing_job();
        job.result = Some(json!(1));
        job.finish(JobOutcome::Failed("boom".into()), 5000).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_finish_same_terminal_state_keeps_completed_at() {
        let mut job = processing_job();
        job.finish(JobOutcome::Failed("first".into()), 5000).unwrap();
        job.finish(JobOutcome::Failed("second".into()), 9000).unwrap();
        assert_eq!(job.completed_at, Some(5000));
        assert_eq!(job.error.as_deref(), Some("second"));
    }

    #[test]
    fn test_finish_rejects_pending_job() {
        let mut job = Job::new_test("tenant-a", JobType::new("x"), JobPayload::new(json!({})));
        let err = job.finish(JobOutcome::Completed(json!(null)), 1).unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }
}
