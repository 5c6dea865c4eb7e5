// Stuck-job reclaim (optional watchdog)
//
// A claimed job whose handler hangs stays PROCESSING forever. There is no
// built-in timeout: this reclaimer only runs when the integrator configures
// one, and then moves PROCESSING rows untouched for longer than the timeout
// back to PENDING, or to FAILED when no attempt is left.

use crate::application::queue::JobQueue;
use crate::application::worker::ShutdownToken;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Moves long-running PROCESSING jobs back into the queue.
///
/// The reclaimer cannot tell a hung handler from a slow one. A handler that
/// runs longer than `timeout` is still running when its job is handed back,
/// so a second worker may start the same job while the first is busy. The
/// first run's outcome is then rejected with `InvalidState` once the job has
/// left PROCESSING. If the second run has already claimed it, the first
/// outcome lands on the second run's row. Pick a timeout well above the
/// slowest handler, and keep handlers idempotent when a reclaimer is enabled.
pub struct StuckJobReclaimer {
    queue: Arc<JobQueue>,
    timeout: Duration,
    check_interval: Duration,
}

impl StuckJobReclaimer {
    /// Create a reclaimer
    ///
    /// # Arguments
    /// * `queue` - Queue to watch
    /// * `timeout` - How long a job may stay PROCESSING without an update
    /// * `check_interval` - How often to scan
    pub fn new(queue: Arc<JobQueue>, timeout: Duration, check_interval: Duration) -> Self {
        Self {
            queue,
            timeout,
            check_interval,
        }
    }

    /// Single scan, returns the number of jobs reclaimed (requeued or failed)
    pub async fn reclaim_once(&self) -> Result<u64> {
        self.queue.reclaim_stuck(self.timeout).await
    }

    /// Run until shutdown (background task)
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            timeout_secs = self.timeout.as_secs(),
            check_interval_secs = self.check_interval.as_secs(),
            "Stuck-job reclaimer started"
        );

        let mut tick = interval(self.check_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.reclaim_once().await {
                        error!(error = ?e, "Stuck-job scan failed");
                    }
                }
                _ = shutdown.wait() => break,
            }
        }

        info!("Stuck-job reclaimer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::queue::EnqueueRequest;
    use crate::domain::JobStatus;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::MockTimeProvider;
    use serde_json::json;

    #[tokio::test]
    async fn test_reclaims_only_old_processing_jobs() {
        let clock = Arc::new(MockTimeProvider::new(1_000_000));
        let repo = Arc::new(InMemoryJobRepository::new(clock.clone()));
        let queue = Arc::new(JobQueue::new(
            repo,
            Arc::new(SequentialIdProvider::default()),
            clock.clone(),
        ));

        let stuck = queue
            .enqueue(EnqueueRequest::new("t", "x", json!({})))
            .await
            .unwrap();
        queue.claim().await.unwrap().unwrap();
        queue.increment_attempts(&stuck).await.unwrap();

        clock.advance(10 * 60 * 1000);

        let fresh = queue
            .enqueue(EnqueueRequest::new("t", "x", json!({})))
            .await
            .unwrap();
        queue.claim().await.unwrap().unwrap();

        let reclaimer = StuckJobReclaimer::new(
            queue.clone(),
            Duration::from_secs(5 * 60),
            Duration::from_secs(60),
        );
        assert_eq!(reclaimer.reclaim_once().await.unwrap(), 1);

        let stuck = queue.get_job(&stuck).await.unwrap().unwrap();
        assert_eq!(stuck.status, JobStatus::Pending);
        assert_eq!(stuck.attempts, 1);
        let fresh = queue.get_job(&fresh).await.unwrap().unwrap();
        assert_eq!(fresh.status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_stuck_job_without_attempts_left_is_failed() {
        let clock = Arc::new(MockTimeProvider::new(1_000_000));
        let repo = Arc::new(InMemoryJobRepository::new(clock.clone()));
        let queue = Arc::new(JobQueue::new(
            repo,
            Arc::new(SequentialIdProvider::default()),
            clock.clone(),
        ));

        let id = queue
            .enqueue(EnqueueRequest::new("t", "x", json!({})).with_max_attempts(1))
            .await
            .unwrap();
        queue.claim().await.unwrap().unwrap();
        queue.increment_attempts(&id).await.unwrap();

        clock.advance(10 * 60 * 1000);
        let reclaimer =
            StuckJobReclaimer::new(queue.clone(), Duration::from_secs(60), Duration::from_secs(60));
        assert_eq!(reclaimer.reclaim_once().await.unwrap(), 1);

        let job = queue.get_job(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.error.as_deref(), Some(crate::port::STUCK_JOB_EXHAUSTED_ERROR));
        assert!(queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_late_outcome_from_reclaimed_run_is_rejected() {
        let clock = Arc::new(MockTimeProvider::new(1_000_000));
        let repo = Arc::new(InMemoryJobRepository::new(clock.clone()));
        let queue = Arc::new(JobQueue::new(
            repo,
            Arc::new(SequentialIdProvider::default()),
            clock.clone(),
        ));

        let id = queue
            .enqueue(EnqueueRequest::new("t", "x", json!({})))
            .await
            .unwrap();
        queue.claim().await.unwrap().unwrap();
        queue.increment_attempts(&id).await.unwrap();

        clock.advance(10 * 60 * 1000);
        let reclaimer =
            StuckJobReclaimer::new(queue.clone(), Duration::from_secs(60), Duration::from_secs(60));
        assert_eq!(reclaimer.reclaim_once().await.unwrap(), 1);

        let err = queue
            .update_status(&id, crate::domain::JobOutcome::Completed(json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::InvalidState(_)));
        let job = queue.get_job(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.result.is_none());
    }
}
