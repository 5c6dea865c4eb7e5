//! Shared setup for the integration tests

#![allow(dead_code)]

use jobqueue_core::application::{EnqueueRequest, JobQueue};
use jobqueue_core::domain::{JobId, JobPriority};
use jobqueue_core::port::id_provider::UuidProvider;
use jobqueue_core::port::time_provider::mocks::MockTimeProvider;
use jobqueue_core::port::TimeProvider;
use jobqueue_infra_sqlite::{create_pool, database_url, run_migrations, SqliteJobRepository};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

pub const T0: i64 = 1_700_000_000_000;

/// File-backed database so that every pool connection sees the same data.
///
/// Keep the `TempDir` alive for the duration of the test.
pub async fn file_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = database_url(&dir.path().join("jobs.db")).unwrap();
    let pool = create_pool(&url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (pool, dir)
}

pub fn queue_with_clock(pool: &SqlitePool, clock: Arc<dyn TimeProvider>) -> Arc<JobQueue> {
    let repo = Arc::new(SqliteJobRepository::new(pool.clone(), clock.clone()));
    Arc::new(JobQueue::new(repo, Arc::new(UuidProvider), clock))
}

/// Queue on a file database with a manual clock that never moves by itself
pub async fn manual_clock_queue() -> (Arc<JobQueue>, Arc<MockTimeProvider>, SqlitePool, TempDir) {
    let (pool, dir) = file_pool().await;
    let clock = Arc::new(MockTimeProvider::new(T0));
    let queue = queue_with_clock(&pool, clock.clone());
    (queue, clock, pool, dir)
}

pub async fn enqueue(queue: &JobQueue, job_type: &str, priority: JobPriority) -> JobId {
    queue
        .enqueue(
            EnqueueRequest::new("tenant-a", job_type, serde_json::json!({}))
                .with_priority(priority),
        )
        .await
        .unwrap()
}
