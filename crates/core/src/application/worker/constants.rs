// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no jobs are available (500ms)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Sleep duration after worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default retry base delay (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default reaper interval (1 hour)
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default stuck-job scan interval when a timeout is configured (1 minute)
pub const DEFAULT_RECLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// Default number of workers per process
pub const DEFAULT_WORKER_COUNT: usize = 2;
