//! Claim ordering and exclusivity against a real SQLite database

mod common;

use common::{enqueue, file_pool, manual_clock_queue, queue_with_clock};
use jobqueue_core::domain::{JobPriority, JobStatus};
use jobqueue_core::port::time_provider::SystemTimeProvider;
use std::collections::HashSet;
use std::sync::Arc;

/// N concurrent claimers never receive the same job twice
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_are_exclusive() {
    let (pool, _dir) = file_pool().await;
    let queue = queue_with_clock(&pool, Arc::new(SystemTimeProvider));

    const JOBS: usize = 60;
    const CLAIMERS: usize = 8;

    let priorities = [JobPriority::High, JobPriority::Medium, JobPriority::Low];
    for i in 0..JOBS {
        enqueue(&queue, "noop", priorities[i % 3]).await;
    }

    let mut handles = Vec::new();
    for _ in 0..CLAIMERS {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(job) = queue.claim().await.unwrap() {
                assert_eq!(job.status, JobStatus::Processing);
                claimed.push(job.id);
            }
            claimed
        }));
    }

    let mut all = Vec::new();
    for result in futures::future::join_all(handles).await {
        all.extend(result.unwrap());
    }

    // A claimer that lost every race may stop early; drain what is left
    while let Some(job) = queue.claim().await.unwrap() {
        all.push(job.id);
    }

    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(unique.len(), all.len(), "a job was claimed twice");
    assert_eq!(all.len(), JOBS);

    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.count(JobStatus::Processing), JOBS as i64);
    assert_eq!(stats.count(JobStatus::Pending), 0);
}

#[tokio::test]
async fn test_priority_precedence_over_age() {
    let (queue, clock, _pool, _dir) = manual_clock_queue().await;

    let low = enqueue(&queue, "noop", JobPriority::Low).await;
    clock.advance(1_000);
    let medium = enqueue(&queue, "noop", JobPriority::Medium).await;
    clock.advance(1_000);
    let high = enqueue(&queue, "noop", JobPriority::High).await;

    assert_eq!(queue.claim().await.unwrap().unwrap().id, high);
    assert_eq!(queue.claim().await.unwrap().unwrap().id, medium);
    assert_eq!(queue.claim().await.unwrap().unwrap().id, low);
    assert!(queue.claim().await.unwrap().is_none());
}

#[tokio::test]
async fn test_fifo_within_a_class() {
    let (queue, clock, _pool, _dir) = manual_clock_queue().await;

    let first = enqueue(&queue, "noop", JobPriority::Medium).await;
    clock.advance(5);
    let second = enqueue(&queue, "noop", JobPriority::Medium).await;
    // Same millisecond as `second`: insertion order breaks the tie
    let third = enqueue(&queue, "noop", JobPriority::Medium).await;

    assert_eq!(queue.claim().await.unwrap().unwrap().id, first);
    assert_eq!(queue.claim().await.unwrap().unwrap().id, second);
    assert_eq!(queue.claim().await.unwrap().unwrap().id, third);
}

/// A high job enqueued after a low one is still served first
#[tokio::test]
async fn test_late_high_overtakes_waiting_low() {
    let (queue, clock, _pool, _dir) = manual_clock_queue().await;

    let low = enqueue(&queue, "noop", JobPriority::Low).await;
    clock.advance(60_000);
    let high = enqueue(&queue, "noop", JobPriority::High).await;

    let claimed = queue.claim().await.unwrap().unwrap();
    assert_eq!(claimed.id, high);
    assert_eq!(claimed.priority, JobPriority::High);

    let low_job = queue.get_job(&low).await.unwrap().unwrap();
    assert_eq!(low_job.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_claim_on_empty_queue_returns_none() {
    let (queue, _clock, _pool, _dir) = manual_clock_queue().await;
    assert!(queue.claim().await.unwrap().is_none());
}

/// One PENDING job, N racing claimers: exactly one wins
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_job_has_single_winner() {
    let (pool, _dir) = file_pool().await;
    let queue = queue_with_clock(&pool, Arc::new(SystemTimeProvider));
    let id = enqueue(&queue, "email_sending", JobPriority::Medium).await;

    let barrier = Arc::new(tokio::sync::Barrier::new(8));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let queue = queue.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            queue.claim().await.unwrap()
        }));
    }

    let winners: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .filter_map(|r| r.unwrap())
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].id, id);
}
