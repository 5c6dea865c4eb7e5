//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC parameters to `JobQueue` operations.

use crate::error::to_rpc_error;
use crate::types::{
    CleanupRequest, CleanupResponse, EnqueueRequest, EnqueueResponse, GetJobRequest,
    HandlersResponse, ListJobsRequest, ListJobsResponse, RetryRequest, RetryResponse,
    StatsResponse,
};
use jobqueue_core::application::{queue, HandlerRegistry, JobQueue};
use jobqueue_core::domain::{Job, JobStatus};
use jobqueue_core::error::AppError;
use jobqueue_core::port::Maintenance;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;
use std::time::Instant;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    queue: Arc<JobQueue>,
    maintenance: Arc<dyn Maintenance>,
    registry: Arc<HandlerRegistry>,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        queue: Arc<JobQueue>,
        maintenance: Arc<dyn Maintenance>,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            queue,
            maintenance,
            registry,
            start_time: Instant::now(),
        }
    }

    /// jobs.enqueue.v1
    pub async fn enqueue(
        &self,
        params: EnqueueRequest,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        let priority = params.priority.unwrap_or_default();
        let req = queue::EnqueueRequest {
            tenant_id: params.tenant_id,
            job_type: params.job_type,
            payload: params.payload,
            priority: params.priority,
            max_attempts: params.max_attempts,
        };

        let job_id = self.queue.enqueue(req).await.map_err(to_rpc_error)?;

        Ok(EnqueueResponse {
            job_id,
            status: JobStatus::Pending,
            priority,
        })
    }

    /// jobs.get.v1
    pub async fn get_job(&self, params: GetJobRequest) -> Result<Job, ErrorObjectOwned> {
        self.find(&params.job_id).await
    }

    /// jobs.list.v1
    pub async fn list_jobs(
        &self,
        params: ListJobsRequest,
    ) -> Result<ListJobsResponse, ErrorObjectOwned> {
        if params.tenant_id.trim().is_empty() {
            return Err(to_rpc_error(AppError::Validation(
                "tenant_id must not be empty".to_string(),
            )));
        }
        let page = self
            .queue
            .list_jobs(&params.tenant_id, params.limit, params.offset)
            .await
            .map_err(to_rpc_error)?;

        Ok(ListJobsResponse {
            jobs: page.jobs,
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    /// jobs.retry.v1
    pub async fn retry(&self, params: RetryRequest) -> Result<RetryResponse, ErrorObjectOwned> {
        let result = if params.reset_attempts {
            self.queue.retry(&params.job_id).await
        } else {
            self.queue.retry_job(&params.job_id).await
        };
        result.map_err(to_rpc_error)?;

        let job = self.find(&params.job_id).await?;
        Ok(RetryResponse {
            job_id: job.id,
            status: job.status,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
        })
    }

    /// admin.cleanup.v1
    pub async fn cleanup(
        &self,
        params: CleanupRequest,
    ) -> Result<CleanupResponse, ErrorObjectOwned> {
        let deleted = self
            .queue
            .cleanup(params.older_than_days)
            .await
            .map_err(to_rpc_error)?;

        Ok(CleanupResponse {
            deleted,
            older_than_days: params.older_than_days,
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> Result<StatsResponse, ErrorObjectOwned> {
        let stats = self.queue.stats().await.map_err(to_rpc_error)?;
        let db = self.maintenance.get_stats().await.map_err(to_rpc_error)?;

        Ok(StatsResponse {
            total_jobs: stats.total(),
            by_status: stats.counts,
            db_size_bytes: db.db_size_bytes,
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }

    /// admin.handlers.v1
    pub fn handlers(&self) -> HandlersResponse {
        HandlersResponse {
            handlers: self.registry.registered_handlers(),
        }
    }

    async fn find(&self, job_id: &str) -> Result<Job, ErrorObjectOwned> {
        self.queue
            .get_job(&job_id.to_string())
            .await
            .map_err(to_rpc_error)?
            .ok_or_else(|| to_rpc_error(AppError::NotFound(format!("Job {} not found", job_id))))
    }
}
