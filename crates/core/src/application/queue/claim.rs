// Claim Use Case
//
// For each priority class in strict order:
//   1. select the id of the oldest PENDING row in the class
//   2. UPDATE ... SET status = PROCESSING WHERE id = ? AND status = PENDING
//   3. one row affected -> the job is ours; zero rows -> another worker
//      claimed it first, move on to the next class
//
// The `status = PENDING` guard in step 2 is what prevents a double claim.

use crate::domain::{Job, JobPriority};
use crate::error::Result;
use crate::port::JobRepository;
use tracing::{debug, info};

/// Claim at most one PENDING job for the calling worker.
///
/// Returns `Ok(None)` when there is no work. Storage errors propagate and the
/// caller must not assume any job changed state.
pub async fn execute(job_repo: &dyn JobRepository) -> Result<Option<Job>> {
    for priority in JobPriority::CLAIM_ORDER {
        let Some(candidate) = job_repo.oldest_pending(priority).await? else {
            continue;
        };

        match job_repo.mark_processing(&candidate).await? {
            Some(job) => {
                info!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    priority = %job.priority,
                    "Job claimed"
                );
                return Ok(Some(job));
            }
            None => {
                debug!(
                    job_id = %candidate,
                    priority = %priority,
                    "Lost claim race, trying next priority class"
                );
            }
        }
    }
    Ok(None)
}
