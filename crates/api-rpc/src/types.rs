//! RPC Request/Response Types
//!
//! JSON-RPC method parameters (named, snake_case) and results.

use jobqueue_core::domain::{Job, JobPriority, JobStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// jobs.enqueue.v1 - Enqueue a job
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub tenant_id: String,
    pub job_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority: Option<JobPriority>,
    #[serde(default)]
    pub max_attempts: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub priority: JobPriority,
}

/// jobs.get.v1 - Fetch one job
#[derive(Debug, Deserialize)]
pub struct GetJobRequest {
    pub job_id: String,
}

/// jobs.list.v1 - List jobs of a tenant, newest first
#[derive(Debug, Deserialize)]
pub struct ListJobsRequest {
    pub tenant_id: String,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// jobs.retry.v1 - Force-retry a FAILED job
#[derive(Debug, Deserialize)]
pub struct RetryRequest {
    pub job_id: String,
    /// true: managed retry (fresh budget), false: keep attempts and respect the ceiling
    #[serde(default = "default_reset_attempts")]
    pub reset_attempts: bool,
}

fn default_reset_attempts() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
}

/// admin.cleanup.v1 - Delete old terminal jobs
#[derive(Debug, Deserialize)]
pub struct CleanupRequest {
    #[serde(default = "default_older_than_days")]
    pub older_than_days: i64,
}

fn default_older_than_days() -> i64 {
    jobqueue_core::application::queue::DEFAULT_RETENTION_DAYS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub deleted: u64,
    pub older_than_days: i64,
}

/// admin.stats.v1 - Queue and database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub by_status: BTreeMap<String, i64>,
    pub db_size_bytes: i64,
    pub uptime_seconds: i64,
}

/// admin.handlers.v1 - Registered job types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlersResponse {
    pub handlers: Vec<String>,
}
