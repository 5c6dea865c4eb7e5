// Job Repository Port (Interface)
//
// Every mutating method is a single-row statement scoped by id. There is no
// multi-row transaction, which is what keeps concurrent workers deadlock-free.

use crate::domain::{Job, JobId, JobOutcome, JobPriority, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job (durable before returning)
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Jobs of one tenant, newest first
    async fn list_by_tenant(&self, tenant_id: &str, limit: i64, offset: i64) -> Result<Vec<Job>>;

    /// Total jobs of one tenant
    async fn count_by_tenant(&self, tenant_id: &str) -> Result<i64>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    /// Identifier of the oldest PENDING job in one priority class
    async fn oldest_pending(&self, priority: JobPriority) -> Result<Option<JobId>>;

    /// Conditional claim: PENDING -> PROCESSING only if the row is still PENDING.
    ///
    /// Returns `None` when another worker won the race (zero rows affected).
    async fn mark_processing(&self, id: &JobId) -> Result<Option<Job>>;

    /// Record the terminal outcome of the current attempt
    async fn record_outcome(&self, id: &JobId, outcome: &JobOutcome) -> Result<()>;

    /// FAILED -> PENDING with a fresh budget (attempts = 0)
    async fn reset_for_retry(&self, id: &JobId) -> Result<()>;

    /// FAILED -> PENDING keeping `attempts`, refused once the stored budget is spent
    async fn requeue(&self, id: &JobId) -> Result<()>;

    /// Atomically add one attempt, returning the stored count
    async fn increment_attempts(&self, id: &JobId) -> Result<i32>;

    /// Delete COMPLETED/FAILED jobs whose `completed_at` is before the cutoff
    async fn delete_finished_before(&self, cutoff_millis: i64) -> Result<u64>;

    /// Rows PROCESSING and untouched since the cutoff go back to PENDING, or
    /// to FAILED with [`STUCK_JOB_EXHAUSTED_ERROR`] when `attempts >= max_attempts`.
    /// Returns the number of rows moved either way.
    async fn reclaim_processing_before(&self, cutoff_millis: i64) -> Result<u64>;
}

/// Error recorded on a stuck job that has no attempt left to be reclaimed with
pub const STUCK_JOB_EXHAUSTED_ERROR: &str =
    "Stuck in PROCESSING past the timeout; retry budget exhausted";

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::sync::{Arc, Mutex};

    /// In-memory repository with the same conditional semantics as the SQL store
    pub struct InMemoryJobRepository {
        jobs: Mutex<Vec<Job>>,
        time_provider: Arc<dyn TimeProvider>,
    }

    impl InMemoryJobRepository {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                jobs: Mutex::new(Vec::new()),
                time_provider,
            }
        }

        fn with_job<T>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> Result<T>) -> Result<T> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| &j.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
            f(job)
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.iter().any(|j| j.id == job.id) {
                return Err(AppError::Database(format!("Duplicate job id {}", job.id)));
            }
            jobs.push(job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs.iter().find(|j| &j.id == id).cloned())
        }

        async fn list_by_tenant(
            &self,
            tenant_id: &str,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<Job>> {
            let jobs = self.jobs.lock().unwrap();
            let mut matching: Vec<Job> = jobs
                .iter()
                .filter(|j| j.tenant_id == tenant_id)
                .cloned()
                .collect();
            // Insertion order breaks ties, newest first
            matching.reverse();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(matching
                .into_iter()
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .collect())
        }

        async fn count_by_tenant(&self, tenant_id: &str) -> Result<i64> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs.iter().filter(|j| j.tenant_id == tenant_id).count() as i64)
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs.iter().filter(|j| j.status == status).count() as i64)
        }

        async fn oldest_pending(&self, priority: JobPriority) -> Result<Option<JobId>> {
            let jobs = self.jobs.lock().unwrap();
            // min_by_key keeps the first of equal keys, i.e. insertion order
            Ok(jobs
                .iter()
                .filter(|j| j.status == JobStatus::Pending && j.priority == priority)
                .min_by_key(|j| j.created_at)
                .map(|j| j.id.clone()))
        }

        async fn mark_processing(&self, id: &JobId) -> Result<Option<Job>> {
            let now = self.time_provider.now_millis();
            let mut jobs = self.jobs.lock().unwrap();
            match jobs
                .iter_mut()
                .find(|j| &j.id == id && j.status == JobStatus::Pending)
            {
                Some(job) => {
                    job.status = JobStatus::Processing;
                    job.updated_at = now;
                    Ok(Some(job.clone()))
                }
                None => Ok(None),
            }
        }

        async fn record_outcome(&self, id: &JobId, outcome: &JobOutcome) -> Result<()> {
            let now = self.time_provider.now_millis();
            self.with_job(id, |job| {
                job.finish(outcome.clone(), now).map_err(|e| {
                    AppError::InvalidState(format!("Cannot update job {}: {}", job.id, e))
                })
            })
        }

        async fn reset_for_retry(&self, id: &JobId) -> Result<()> {
            let now = self.time_provider.now_millis();
            self.with_job(id, |job| {
                if job.status != JobStatus::Failed {
                    return Err(AppError::InvalidState(format!(
                        "Job {} is {}, only FAILED jobs can be retried",
                        job.id, job.status
                    )));
                }
                job.status = JobStatus::Pending;
                job.error = None;
                job.attempts = 0;
                job.completed_at = None;
                job.updated_at = now;
                Ok(())
            })
        }

        async fn requeue(&self, id: &JobId) -> Result<()> {
            let now = self.time_provider.now_millis();
            self.with_job(id, |job| {
                if job.is_exhausted() {
                    return Err(AppError::RetryBudgetExhausted {
                        job_id: job.id.clone(),
                        attempts: job.attempts,
                        max_attempts: job.max_attempts,
                    });
                }
                if job.status != JobStatus::Failed {
                    return Err(AppError::InvalidState(format!(
                        "Job {} is {}, only FAILED jobs can be re-enqueued",
                        job.id, job.status
                    )));
                }
                job.status = JobStatus::Pending;
                job.error = None;
                job.completed_at = None;
                job.updated_at = now;
                Ok(())
            })
        }

        async fn increment_attempts(&self, id: &JobId) -> Result<i32> {
            let now = self.time_provider.now_millis();
            self.with_job(id, |job| {
                job.attempts += 1;
                job.updated_at = now;
                Ok(job.attempts)
            })
        }

        async fn delete_finished_before(&self, cutoff_millis: i64) -> Result<u64> {
            let mut jobs = self.jobs.lock().unwrap();
            let before = jobs.len();
            jobs.retain(|j| {
                !(j.status.is_terminal() && j.completed_at.is_some_and(|t| t < cutoff_millis))
            });
            Ok((before - jobs.len()) as u64)
        }

        async fn reclaim_processing_before(&self, cutoff_millis: i64) -> Result<u64> {
            let now = self.time_provider.now_millis();
            let mut jobs = self.jobs.lock().unwrap();
            let mut reclaimed = 0;
            for job in jobs
                .iter_mut()
                .filter(|j| j.status == JobStatus::Processing && j.updated_at < cutoff_millis)
            {
                if job.is_exhausted() {
                    job.status = JobStatus::Failed;
                    job.result = None;
                    job.error = Some(STUCK_JOB_EXHAUSTED_ERROR.to_string());
                    job.completed_at = Some(now);
                } else {
                    job.status = JobStatus::Pending;
                }
                job.updated_at = now;
                reclaimed += 1;
            }
            Ok(reclaimed)
        }
    }
}
