// Job Queue Service - enqueue, claim, outcome, retry and cleanup

pub mod claim;
pub mod enqueue;

pub use enqueue::EnqueueRequest;

use crate::domain::{Job, JobId, JobOutcome, JobStatus};
use crate::error::{AppError, Result};
use crate::port::time_provider::days_before;
use crate::port::{IdProvider, JobRepository, TimeProvider};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default page size for tenant listings
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Upper bound on a single listing page
pub const MAX_LIST_LIMIT: i64 = 500;

/// Default retention window for the reaper
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Largest accepted retention window (about a century)
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// One page of a tenant listing
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Job counts per status
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub counts: BTreeMap<String, i64>,
}

impl QueueStats {
    pub fn count(&self, status: JobStatus) -> i64 {
        self.counts.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }
}

/// Job Queue
///
/// All state lives in the repository; the service itself is stateless and
/// can be shared by any number of workers.
pub struct JobQueue {
    job_repo: Arc<dyn JobRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobQueue {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            job_repo,
            id_provider,
            time_provider,
        }
    }

    /// Enqueue a new job (PENDING, durable on return)
    pub async fn enqueue(&self, req: EnqueueRequest) -> Result<JobId> {
        enqueue::execute(
            self.job_repo.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            req,
        )
        .await
    }

    /// Claim the next job in priority order, or `None` if nothing is PENDING
    pub async fn claim(&self) -> Result<Option<Job>> {
        claim::execute(self.job_repo.as_ref()).await
    }

    /// Record the terminal outcome of a PROCESSING job.
    ///
    /// Re-applying the same terminal state is harmless; any other transition
    /// is rejected with `InvalidState`.
    pub async fn update_status(&self, id: &JobId, outcome: JobOutcome) -> Result<()> {
        let status = outcome.status();
        self.job_repo.record_outcome(id, &outcome).await?;
        match &outcome {
            JobOutcome::Completed(_) => info!(job_id = %id, status = %status, "Job completed"),
            JobOutcome::Failed(error) => {
                warn!(job_id = %id, status = %status, error = %error, "Job failed")
            }
        }
        Ok(())
    }

    /// Managed retry: FAILED -> PENDING with a fresh attempt budget
    pub async fn retry(&self, id: &JobId) -> Result<()> {
        self.job_repo.reset_for_retry(id).await?;
        info!(job_id = %id, "Job reset for retry (attempts cleared)");
        Ok(())
    }

    /// Attempt-preserving re-enqueue.
    ///
    /// The ceiling is checked against the stored row in the same statement
    /// that re-arms the job, so concurrent callers cannot push a job past
    /// `max_attempts`.
    ///
    /// # Errors
    /// `RetryBudgetExhausted` when `attempts >= max_attempts`
    pub async fn retry_job(&self, id: &JobId) -> Result<()> {
        self.job_repo.requeue(id).await?;
        info!(job_id = %id, "Job re-enqueued (attempts preserved)");
        Ok(())
    }

    /// Spend one attempt, returning the stored count
    pub async fn increment_attempts(&self, id: &JobId) -> Result<i32> {
        self.job_repo.increment_attempts(id).await
    }

    /// Delete COMPLETED/FAILED jobs finished more than `older_than_days` ago.
    ///
    /// PENDING and PROCESSING jobs are never deleted, whatever their age.
    pub async fn cleanup(&self, older_than_days: i64) -> Result<u64> {
        if !(0..=MAX_RETENTION_DAYS).contains(&older_than_days) {
            return Err(AppError::Validation(format!(
                "older_than_days must be between 0 and {}, got {}",
                MAX_RETENTION_DAYS, older_than_days
            )));
        }
        let now = self.time_provider.now_millis();
        let cutoff = days_before(now, older_than_days).ok_or_else(|| {
            AppError::Validation(format!(
                "older_than_days {} is out of range for the current time",
                older_than_days
            ))
        })?;

        let deleted = self.job_repo.delete_finished_before(cutoff).await?;
        info!(
            older_than_days = older_than_days,
            cutoff = cutoff,
            deleted = deleted,
            "Cleanup completed"
        );
        Ok(deleted)
    }

    /// Fetch a single job
    pub async fn get_job(&self, id: &JobId) -> Result<Option<Job>> {
        self.job_repo.find_by_id(id).await
    }

    /// Jobs of one tenant, newest first
    pub async fn list_jobs(
        &self,
        tenant_id: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<JobPage> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let offset = offset.unwrap_or(0).max(0);

        let jobs = self
            .job_repo
            .list_by_tenant(tenant_id, limit, offset)
            .await?;
        let total = self.job_repo.count_by_tenant(tenant_id).await?;

        Ok(JobPage {
            jobs,
            total,
            limit,
            offset,
        })
    }

    /// Count jobs in every status
    pub async fn stats(&self) -> Result<QueueStats> {
        let mut stats = QueueStats::default();
        for status in JobStatus::ALL {
            let count = self.job_repo.count_by_status(status).await?;
            stats.counts.insert(status.to_string(), count);
        }
        Ok(stats)
    }

    /// Return PROCESSING jobs untouched for longer than `timeout` to PENDING.
    ///
    /// `attempts` is left as is; the next claim spends a new attempt. A job
    /// whose budget is already spent is marked FAILED instead.
    pub async fn reclaim_stuck(&self, timeout: Duration) -> Result<u64> {
        let too_large = || AppError::Validation("stuck-job timeout is too large".into());
        let timeout_ms = i64::try_from(timeout.as_millis()).map_err(|_| too_large())?;
        let cutoff = self
            .time_provider
            .now_millis()
            .checked_sub(timeout_ms)
            .ok_or_else(too_large)?;
        let reclaimed = self.job_repo.reclaim_processing_before(cutoff).await?;
        if reclaimed > 0 {
            warn!(reclaimed = reclaimed, cutoff = cutoff, "Reclaimed stuck PROCESSING jobs");
        }
        Ok(reclaimed)
    }
}
