// SQLite JobRepository Implementation
//
// Every mutation is one conditional statement on one row. Under WAL the
// database serialises writers, so the `WHERE ... AND status = ?` guard is
// evaluated atomically with the write.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use jobqueue_core::domain::{
    Job, JobId, JobOutcome, JobPayload, JobPriority, JobStatus, JobType,
};
use jobqueue_core::error::{AppError, Result};
use jobqueue_core::port::{JobRepository, TimeProvider, STUCK_JOB_EXHAUSTED_ERROR};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Current (status, attempts, max_attempts) of a row, for diagnosing a
    /// conditional update that matched nothing
    async fn current_state(&self, id: &JobId) -> Result<Option<(String, i32, i32)>> {
        sqlx::query_as("SELECT status, attempts, max_attempts FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn not_found_or_invalid(&self, id: &JobId, action: &str) -> AppError {
        match self.current_state(id).await {
            Ok(None) => AppError::NotFound(format!("Job {} not found", id)),
            Ok(Some((status, _, _))) => {
                AppError::InvalidState(format!("Cannot {} job {} in status {}", action, id, status))
            }
            Err(e) => e,
        }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &Job) -> Result<()> {
        let result = job.result.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, tenant_id, job_type, status, priority,
                payload, result, error,
                attempts, max_attempts,
                created_at, updated_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.tenant_id)
        .bind(job.job_type.as_str())
        .bind(job.status.as_str())
        .bind(job.priority.as_str())
        .bind(job.payload.as_value().to_string())
        .bind(result)
        .bind(&job.error)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(Job::try_from).transpose()
    }

    async fn list_by_tenant(&self, tenant_id: &str, limit: i64, offset: i64) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE tenant_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(tenant_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn count_by_tenant(&self, tenant_id: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn oldest_pending(&self, priority: JobPriority) -> Result<Option<JobId>> {
        // Same-millisecond enqueues fall back to insertion order
        sqlx::query_scalar(
            r#"
            SELECT id FROM jobs
            WHERE status = 'PENDING' AND priority = ?
            ORDER BY created_at ASC, rowid ASC
            LIMIT 1
            "#,
        )
        .bind(priority.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }

    async fn mark_processing(&self, id: &JobId) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET status = 'PROCESSING', updated_at = ?
            WHERE id = ? AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if row.is_none() {
            debug!(job_id = %id, "Conditional claim matched no row");
        }
        row.map(Job::try_from).transpose()
    }

    async fn record_outcome(&self, id: &JobId, outcome: &JobOutcome) -> Result<()> {
        let now = self.time_provider.now_millis();
        let status = outcome.status();
        let (result, error) = match outcome {
            JobOutcome::Completed(value) => (Some(serde_json::to_string(value)?), None),
            JobOutcome::Failed(message) => (None, Some(message.as_str())),
        };

        // Re-applying the same terminal state keeps the first completed_at
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?1,
                result = ?2,
                error = ?3,
                completed_at = CASE WHEN status = ?1 THEN completed_at ELSE ?4 END,
                updated_at = ?4
            WHERE id = ?5 AND status IN ('PROCESSING', ?1)
            "#,
        )
        .bind(status.as_str())
        .bind(result)
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if updated.rows_affected() == 0 {
            return Err(self
                .not_found_or_invalid(id, &format!("mark {}", status))
                .await);
        }
        Ok(())
    }

    async fn reset_for_retry(&self, id: &JobId) -> Result<()> {
        let now = self.time_provider.now_millis();

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'PENDING', attempts = 0, error = NULL,
                completed_at = NULL, updated_at = ?
            WHERE id = ? AND status = 'FAILED'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if updated.rows_affected() == 0 {
            return Err(self.not_found_or_invalid(id, "retry").await);
        }
        Ok(())
    }

    async fn requeue(&self, id: &JobId) -> Result<()> {
        let now = self.time_provider.now_millis();

        // The ceiling is part of the guard: no read-then-write window
        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'PENDING', error = NULL, completed_at = NULL, updated_at = ?
            WHERE id = ? AND status = 'FAILED' AND attempts < max_attempts
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if updated.rows_affected() > 0 {
            return Ok(());
        }

        match self.current_state(id).await? {
            None => Err(AppError::NotFound(format!("Job {} not found", id))),
            Some((_, attempts, max_attempts)) if attempts >= max_attempts => {
                Err(AppError::RetryBudgetExhausted {
                    job_id: id.clone(),
                    attempts,
                    max_attempts,
                })
            }
            Some((status, _, _)) => Err(AppError::InvalidState(format!(
                "Job {} is {}, only FAILED jobs can be re-enqueued",
                id, status
            ))),
        }
    }

    async fn increment_attempts(&self, id: &JobId) -> Result<i32> {
        let now = self.time_provider.now_millis();

        let attempts: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE jobs
            SET attempts = attempts + 1, updated_at = ?
            WHERE id = ?
            RETURNING attempts
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        attempts.ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))
    }

    async fn delete_finished_before(&self, cutoff_millis: i64) -> Result<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE status IN ('COMPLETED', 'FAILED')
              AND completed_at IS NOT NULL
              AND completed_at < ?
            "#,
        )
        .bind(cutoff_millis)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(deleted.rows_affected())
    }

    async fn reclaim_processing_before(&self, cutoff_millis: i64) -> Result<u64> {
        let now = self.time_provider.now_millis();

        // A row with no attempt left fails instead of being handed out again
        let reclaimed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN attempts >= max_attempts THEN 'FAILED' ELSE 'PENDING' END,
                error = CASE WHEN attempts >= max_attempts THEN ?1 ELSE error END,
                result = NULL,
                completed_at = CASE WHEN attempts >= max_attempts THEN ?2 ELSE completed_at END,
                updated_at = ?2
            WHERE status = 'PROCESSING' AND updated_at < ?3
            "#,
        )
        .bind(STUCK_JOB_EXHAUSTED_ERROR)
        .bind(now)
        .bind(cutoff_millis)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(reclaimed.rows_affected())
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    tenant_id: String,
    job_type: String,
    status: String,
    priority: String,
    payload: String,
    result: Option<String>,
    error: Option<String>,
    attempts: i32,
    max_attempts: i32,
    created_at: i64,
    updated_at: i64,
    completed_at: Option<i64>,
}

impl TryFrom<JobRow> for Job {
    type Error = AppError;

    /// Unknown enum values or corrupt JSON are storage errors, never defaulted
    fn try_from(row: JobRow) -> Result<Self> {
        let status = row.status.parse::<JobStatus>().map_err(|e| {
            AppError::Database(format!("Job {} has corrupt status: {}", row.id, e))
        })?;
        let priority = row.priority.parse::<JobPriority>().map_err(|e| {
            AppError::Database(format!("Job {} has corrupt priority: {}", row.id, e))
        })?;
        let payload: serde_json::Value = serde_json::from_str(&row.payload).map_err(|e| {
            AppError::Database(format!("Job {} has corrupt payload: {}", row.id, e))
        })?;
        let result = row
            .result
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .map_err(|e| AppError::Database(format!("Job {} has corrupt result: {}", row.id, e)))?;

        Ok(Job {
            id: row.id,
            tenant_id: row.tenant_id,
            job_type: JobType::new(row.job_type),
            status,
            priority,
            payload: JobPayload::new(payload),
            result,
            error: row.error,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}
