// Retry backoff policy
//
// Decides whether a failed attempt should be re-enqueued and after how long.
// The ceiling itself is enforced by `JobQueue::retry_job` against the stored
// row; this policy only avoids scheduling retries that would be refused.
use crate::domain::Job;
use std::time::Duration;
use tracing::{info, warn};

/// Multiplier applied per spent attempt
const BACKOFF_FACTOR: f64 = 2.0;

/// Upper bound on a single backoff delay (1 hour)
const MAX_BACKOFF_MS: f64 = 60.0 * 60.0 * 1000.0;

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job after the given delay
    Retry(Duration),
    /// Do not retry, job has failed permanently
    Exhausted,
}

/// Exponential backoff policy
///
/// Determines if a job should be retried based on:
/// - Current attempt count (already incremented for the failed attempt)
/// - Maximum attempts allowed
pub struct RetryPolicy {
    base_delay_ms: u64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `base_delay_ms` - Delay before the first retry (default: 1000)
    pub fn new(base_delay_ms: u64) -> Self {
        Self { base_delay_ms }
    }

    /// Determine if a job should be retried
    ///
    /// Backoff formula:
    /// delay = base_delay * (2 ^ (attempts - 1)) * (1.0 ± 0.1)
    pub fn should_retry(&self, job: &Job) -> RetryDecision {
        if job.is_exhausted() {
            warn!(
                job_id = %job.id,
                attempts = %job.attempts,
                max_attempts = %job.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        let exponent = (job.attempts - 1).max(0);
        let base_delay_ms =
            (self.base_delay_ms as f64 * BACKOFF_FACTOR.powi(exponent)).min(MAX_BACKOFF_MS);

        // ±10% jitter keyed on the job id so retries of different jobs spread out
        let jitter_seed = job.id.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9 to 1.1

        let delay = Duration::from_millis((base_delay_ms * jitter_factor) as u64);

        info!(
            job_id = %job.id,
            attempt = %job.attempts,
            max_attempts = %job.max_attempts,
            delay_ms = %delay.as_millis(),
            "Scheduling retry"
        );

        RetryDecision::Retry(delay)
    }
}
