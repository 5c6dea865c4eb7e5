// Application Layer - Use Cases and Business Logic

pub mod executor;
pub mod queue;
pub mod reaper;
pub mod recovery;
pub mod registry;
pub mod retry;
pub mod worker;

// Re-exports
pub use executor::JobExecutor;
pub use queue::{EnqueueRequest, JobPage, JobQueue, QueueStats};
pub use reaper::Reaper;
pub use recovery::StuckJobReclaimer;
pub use registry::HandlerRegistry;
pub use retry::{RetryDecision, RetryPolicy};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker, WorkerConfig};
