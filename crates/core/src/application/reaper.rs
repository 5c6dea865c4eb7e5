// Reaper - periodic deletion of old terminal jobs

use crate::application::queue::JobQueue;
use crate::application::worker::ShutdownToken;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Reaper
///
/// Runs `JobQueue::cleanup` on a fixed interval in the background. Never runs
/// as part of a regular queue operation.
pub struct Reaper {
    queue: Arc<JobQueue>,
    retention_days: i64,
    interval: Duration,
}

impl Reaper {
    /// Create a new reaper
    ///
    /// # Arguments
    /// * `queue` - Queue to clean
    /// * `retention_days` - Keep terminal jobs finished within this many days
    /// * `interval` - How often to run
    pub fn new(queue: Arc<JobQueue>, retention_days: i64, interval: Duration) -> Self {
        Self {
            queue,
            retention_days,
            interval,
        }
    }

    /// Run reaper loop (background task) until shutdown
    ///
    /// The first pass runs immediately. Should be spawned in tokio::spawn
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_days = self.retention_days,
            "Reaper started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if shutdown.is_shutdown() {
                break;
            }
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.run_now().await {
                        error!(error = ?e, "Scheduled cleanup failed");
                    }
                }
                _ = shutdown.wait() => break,
            }
        }

        info!("Reaper stopped");
    }

    /// Run cleanup immediately (for manual trigger)
    pub async fn run_now(&self) -> Result<u64> {
        self.queue.cleanup(self.retention_days).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::queue::EnqueueRequest;
    use crate::application::worker::shutdown_channel;
    use crate::domain::JobOutcome;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::MockTimeProvider;
    use crate::port::time_provider::MILLIS_PER_DAY;
    use serde_json::json;

    #[tokio::test]
    async fn test_reaper_deletes_on_first_tick_and_stops() {
        let clock = Arc::new(MockTimeProvider::new(1_000));
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
        queue
            .update_status(&id, JobOutcome::Failed("boom".into()))
            .await
            .unwrap();
        clock.advance(8 * MILLIS_PER_DAY);

        let (tx, token) = shutdown_channel();
        let reaper = Reaper::new(queue.clone(), 7, Duration::from_secs(3600));
        let handle = tokio::spawn(reaper.run(token));

        // First tick fires immediately
        for _ in 0..50 {
            if queue.get_job(&id).await.unwrap().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(queue.get_job(&id).await.unwrap().is_none());

        tx.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
