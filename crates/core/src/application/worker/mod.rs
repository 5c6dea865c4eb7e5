// Worker - Job execution loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::executor::JobExecutor;
use crate::application::queue::JobQueue;
use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{Job, JobId, JobOutcome};
use crate::error::{AppError, Result};
use crate::port::ExecutionError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Worker tuning
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Idle sleep between empty claims
    pub poll_interval: Duration,
    /// Schedule an attempt-preserving retry after a failure
    pub auto_retry: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            auto_retry: true,
        }
    }
}

/// Worker claims jobs from the shared queue and runs them one at a time
pub struct Worker {
    name: String,
    queue: Arc<JobQueue>,
    executor: Arc<JobExecutor>,
    retry_policy: Arc<RetryPolicy>,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        name: impl Into<String>,
        queue: Arc<JobQueue>,
        executor: Arc<JobExecutor>,
        retry_policy: Arc<RetryPolicy>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            executor,
            retry_policy,
            config,
        }
    }

    /// Run worker loop with graceful shutdown support
    ///
    /// A job already claimed when shutdown arrives is finished first.
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker = %self.name, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!(worker = %self.name, "Worker shutting down");
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(self.config.poll_interval) => {},
                        _ = shutdown.wait() => {
                            info!(worker = %self.name, "Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!(worker = %self.name, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!(worker = %self.name, "Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!(worker = %self.name, "Worker stopped");
        Ok(())
    }

    /// Process next job from queue (returns true if a job was processed)
    ///
    /// claim -> spend attempt -> execute (panic isolated) -> record outcome ->
    /// optionally schedule a delayed retry
    ///
    /// A claimed job with no attempt left is failed without running. If the
    /// attempt cannot be recorded the job is failed on a best-effort basis.
    /// When recording the outcome itself fails the job stays PROCESSING;
    /// only a configured [`StuckJobReclaimer`](crate::application::StuckJobReclaimer)
    /// brings such a job back.
    pub async fn process_next_job(&self) -> Result<bool> {
        let mut job = match self.queue.claim().await? {
            Some(j) => j,
            None => return Ok(false),
        };

        if job.is_exhausted() {
            warn!(
                worker = %self.name,
                job_id = %job.id,
                attempts = job.attempts,
                max_attempts = job.max_attempts,
                "Claimed job has no attempt left, failing without execution"
            );
            let message = format!(
                "Retry budget exhausted: {}/{} attempts used",
                job.attempts, job.max_attempts
            );
            self.queue
                .update_status(&job.id, JobOutcome::Failed(message))
                .await?;
            return Ok(true);
        }

        job.attempts = match self.queue.increment_attempts(&job.id).await {
            Ok(attempts) => attempts,
            Err(e) => {
                self.fail_best_effort(&job.id, format!("Could not record attempt: {}", e))
                    .await;
                return Err(e);
            }
        };

        info!(
            worker = %self.name,
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "Processing job"
        );

        // Handler panics must not kill the worker: run the handler in its own task
        let job = Arc::new(job);
        let executor = Arc::clone(&self.executor);
        let job_for_exec = Arc::clone(&job);
        let handle = tokio::task::spawn(async move { executor.execute(&job_for_exec).await });

        let outcome = match handle.await {
            Ok(Ok(result)) => JobOutcome::Completed(result),
            Ok(Err(e)) => JobOutcome::Failed(e.to_string()),
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "task cancelled".to_string()
                };
                error!(job_id = %job.id, panic = %message, "Handler panicked");
                JobOutcome::Failed(ExecutionError::Panicked(message).to_string())
            }
        };

        let failed = matches!(outcome, JobOutcome::Failed(_));
        self.queue.update_status(&job.id, outcome).await?;

        if failed && self.config.auto_retry {
            self.schedule_retry(&job);
        }
        Ok(true)
    }

    async fn fail_best_effort(&self, job_id: &JobId, message: String) {
        if let Err(e) = self
            .queue
            .update_status(job_id, JobOutcome::Failed(message))
            .await
        {
            error!(job_id = %job_id, error = %e, "Could not fail job, it stays PROCESSING");
        }
    }

    fn schedule_retry(&self, job: &Job) {
        match self.retry_policy.should_retry(job) {
            RetryDecision::Retry(delay) => {
                let queue = Arc::clone(&self.queue);
                let job_id: JobId = job.id.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    match queue.retry_job(&job_id).await {
                        Ok(()) => {}
                        Err(AppError::RetryBudgetExhausted { .. }) => {
                            warn!(job_id = %job_id, "Retry refused, budget exhausted");
                        }
                        Err(e) => {
                            warn!(job_id = %job_id, error = %e, "Scheduled retry failed");
                        }
                    }
                });
            }
            RetryDecision::Exhausted => {
                info!(job_id = %job.id, "Job failed permanently");
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
