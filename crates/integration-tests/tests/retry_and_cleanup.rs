//! Retry ceiling, result/error exclusivity and retention cleanup on SQLite

mod common;

use common::{enqueue, file_pool, manual_clock_queue, queue_with_clock};
use jobqueue_core::application::{
    EnqueueRequest, HandlerRegistry, JobExecutor, JobQueue, Reaper, RetryPolicy, Worker,
    WorkerConfig,
};
use jobqueue_core::domain::{JobId, JobOutcome, JobPriority, JobStatus};
use jobqueue_core::error::AppError;
use jobqueue_core::port::time_provider::{SystemTimeProvider, MILLIS_PER_DAY};
use jobqueue_core::port::STUCK_JOB_EXHAUSTED_ERROR;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

/// One worker pass: claim, spend an attempt, fail
async fn fail_once(queue: &JobQueue, id: &JobId) {
    let job = queue.claim().await.unwrap().unwrap();
    assert_eq!(&job.id, id);
    queue.increment_attempts(id).await.unwrap();
    queue
        .update_status(id, JobOutcome::Failed("boom".into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_retry_job_stops_at_ceiling() {
    let (queue, _clock, _pool, _dir) = manual_clock_queue().await;
    let id = queue
        .enqueue(EnqueueRequest::new("tenant-a", "flaky", json!({})).with_max_attempts(2))
        .await
        .unwrap();

    fail_once(&queue, &id).await;
    queue.retry_job(&id).await.unwrap();
    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 1);

    fail_once(&queue, &id).await;
    let err = queue.retry_job(&id).await.unwrap_err();
    match err {
        AppError::RetryBudgetExhausted {
            attempts,
            max_attempts,
            ..
        } => {
            assert_eq!(attempts, 2);
            assert_eq!(max_attempts, 2);
        }
        other => panic!("expected RetryBudgetExhausted, got {:?}", other),
    }

    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.attempts <= job.max_attempts);
}

#[tokio::test]
async fn test_managed_retry_resets_budget() {
    let (queue, _clock, _pool, _dir) = manual_clock_queue().await;
    let id = queue
        .enqueue(EnqueueRequest::new("tenant-a", "flaky", json!({})).with_max_attempts(1))
        .await
        .unwrap();
    fail_once(&queue, &id).await;

    queue.retry(&id).await.unwrap();
    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert!(job.error.is_none());
    assert!(job.completed_at.is_none());
}

#[tokio::test]
async fn test_retry_of_non_failed_job_is_rejected() {
    let (queue, _clock, _pool, _dir) = manual_clock_queue().await;
    let id = enqueue(&queue, "noop", JobPriority::Medium).await;

    assert!(matches!(
        queue.retry(&id).await.unwrap_err(),
        AppError::InvalidState(_)
    ));
    assert!(matches!(
        queue.retry(&"missing".to_string()).await.unwrap_err(),
        AppError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_result_and_error_are_exclusive() {
    let (queue, _clock, _pool, _dir) = manual_clock_queue().await;

    let ok = enqueue(&queue, "noop", JobPriority::High).await;
    let bad = enqueue(&queue, "noop", JobPriority::Low).await;

    queue.claim().await.unwrap();
    queue
        .update_status(&ok, JobOutcome::Completed(json!({"rows": 3})))
        .await
        .unwrap();
    queue.claim().await.unwrap();
    queue
        .update_status(&bad, JobOutcome::Failed("nope".into()))
        .await
        .unwrap();

    let ok = queue.get_job(&ok).await.unwrap().unwrap();
    assert_eq!(ok.status, JobStatus::Completed);
    assert_eq!(ok.result, Some(json!({"rows": 3})));
    assert!(ok.error.is_none());
    assert!(ok.completed_at.is_some());

    let bad = queue.get_job(&bad).await.unwrap().unwrap();
    assert_eq!(bad.status, JobStatus::Failed);
    assert!(bad.result.is_none());
    assert_eq!(bad.error.as_deref(), Some("nope"));
    assert!(bad.completed_at.is_some());
}

#[tokio::test]
async fn test_cleanup_respects_age_and_status() {
    let (queue, clock, _pool, _dir) = manual_clock_queue().await;

    let done = enqueue(&queue, "noop", JobPriority::High).await;
    let waiting = enqueue(&queue, "noop", JobPriority::Low).await;
    queue.claim().await.unwrap();
    queue
        .update_status(&done, JobOutcome::Completed(json!(null)))
        .await
        .unwrap();

    // One day later: nothing is old enough yet
    clock.advance(MILLIS_PER_DAY);
    assert_eq!(queue.cleanup(7).await.unwrap(), 0);

    // Eight days after completion the finished job goes
    clock.advance(7 * MILLIS_PER_DAY);
    assert_eq!(queue.cleanup(7).await.unwrap(), 1);
    assert!(queue.get_job(&done).await.unwrap().is_none());

    // A PENDING job is never reaped, whatever its age
    clock.advance(22 * MILLIS_PER_DAY);
    assert_eq!(queue.cleanup(7).await.unwrap(), 0);
    let waiting = queue.get_job(&waiting).await.unwrap().unwrap();
    assert_eq!(waiting.status, JobStatus::Pending);

    assert!(matches!(
        queue.cleanup(-1).await.unwrap_err(),
        AppError::Validation(_)
    ));
}

#[tokio::test]
async fn test_reaper_run_now_uses_retention() {
    let (queue, clock, _pool, _dir) = manual_clock_queue().await;
    let id = enqueue(&queue, "noop", JobPriority::Medium).await;
    queue.claim().await.unwrap();
    queue
        .update_status(&id, JobOutcome::Failed("x".into()))
        .await
        .unwrap();

    clock.advance(2 * MILLIS_PER_DAY);
    let reaper = Reaper::new(queue.clone(), 1, Duration::from_secs(3600));
    assert_eq!(reaper.run_now().await.unwrap(), 1);
}

#[tokio::test]
async fn test_stuck_jobs_are_reclaimed() {
    let (queue, clock, _pool, _dir) = manual_clock_queue().await;
    let id = enqueue(&queue, "noop", JobPriority::Medium).await;
    queue.claim().await.unwrap();
    queue.increment_attempts(&id).await.unwrap();

    clock.advance(10 * 60 * 1000);
    assert_eq!(queue.reclaim_stuck(Duration::from_secs(15 * 60)).await.unwrap(), 0);

    clock.advance(10 * 60 * 1000);
    assert_eq!(queue.reclaim_stuck(Duration::from_secs(15 * 60)).await.unwrap(), 1);

    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 1);
}

#[tokio::test]
async fn test_stuck_job_without_attempts_left_is_failed_not_rerun() {
    let (queue, clock, _pool, _dir) = manual_clock_queue().await;
    let id = queue
        .enqueue(EnqueueRequest::new("tenant-a", "count", json!({})).with_max_attempts(1))
        .await
        .unwrap();
    queue.claim().await.unwrap().unwrap();
    queue.increment_attempts(&id).await.unwrap();

    clock.advance(10 * 60 * 1000);
    assert_eq!(queue.reclaim_stuck(Duration::from_secs(60)).await.unwrap(), 1);

    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.error.as_deref(), Some(STUCK_JOB_EXHAUSTED_ERROR));
    assert!(job.completed_at.is_some());

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let mut registry = HandlerRegistry::new();
    registry.register_fn("count", move |_| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!(null))
        }
    });
    let worker = Worker::new(
        "test-worker",
        queue.clone(),
        Arc::new(JobExecutor::new(Arc::new(registry))),
        Arc::new(RetryPolicy::new(0)),
        WorkerConfig {
            poll_interval: Duration::from_millis(20),
            auto_retry: true,
        },
    );

    assert!(!worker.process_next_job().await.unwrap());
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.attempts <= job.max_attempts);
}

#[tokio::test]
async fn test_stale_completion_after_reclaim_is_rejected() {
    let (queue, clock, _pool, _dir) = manual_clock_queue().await;
    let id = enqueue(&queue, "slow", JobPriority::Medium).await;
    queue.claim().await.unwrap().unwrap();
    queue.increment_attempts(&id).await.unwrap();

    clock.advance(20 * 60 * 1000);
    assert_eq!(queue.reclaim_stuck(Duration::from_secs(15 * 60)).await.unwrap(), 1);

    // The slow first run finishes after its row was handed back
    let err = queue
        .update_status(&id, JobOutcome::Completed(json!({"late": true})))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.result.is_none());

    let again = queue.claim().await.unwrap().unwrap();
    assert_eq!(again.id, id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_retry_job_has_single_winner() {
    const RACERS: usize = 8;

    let (pool, _dir) = file_pool().await;
    let queue = queue_with_clock(&pool, Arc::new(SystemTimeProvider));
    let id = queue
        .enqueue(EnqueueRequest::new("tenant-a", "flaky", json!({})).with_max_attempts(3))
        .await
        .unwrap();

    // One attempt left
    fail_once(&queue, &id).await;
    queue.retry_job(&id).await.unwrap();
    fail_once(&queue, &id).await;

    let barrier = Arc::new(Barrier::new(RACERS));
    let racers: Vec<_> = (0..RACERS)
        .map(|_| {
            let queue = queue.clone();
            let barrier = barrier.clone();
            let id = id.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                queue.retry_job(&id).await
            })
        })
        .collect();

    let mut won = 0;
    for racer in racers {
        match racer.await.unwrap() {
            Ok(()) => won += 1,
            Err(AppError::InvalidState(_)) => {}
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }
    assert_eq!(won, 1);

    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 2);
    assert!(job.attempts <= job.max_attempts);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_retry_of_exhausted_job_always_refused() {
    const RACERS: usize = 8;

    let (pool, _dir) = file_pool().await;
    let queue = queue_with_clock(&pool, Arc::new(SystemTimeProvider));
    let id = queue
        .enqueue(EnqueueRequest::new("tenant-a", "flaky", json!({})).with_max_attempts(1))
        .await
        .unwrap();
    fail_once(&queue, &id).await;

    let barrier = Arc::new(Barrier::new(RACERS));
    let racers: Vec<_> = (0..RACERS)
        .map(|_| {
            let queue = queue.clone();
            let barrier = barrier.clone();
            let id = id.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                queue.retry_job(&id).await
            })
        })
        .collect();

    for racer in racers {
        assert!(matches!(
            racer.await.unwrap(),
            Err(AppError::RetryBudgetExhausted { .. })
        ));
    }

    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
}
