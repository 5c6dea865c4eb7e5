// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_handler;
pub mod job_repository;
pub mod maintenance;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_handler::{ExecutionError, HandlerError, JobHandler};
pub use job_repository::{JobRepository, STUCK_JOB_EXHAUSTED_ERROR};
pub use maintenance::{Maintenance, MaintenanceOperation, MaintenanceStats, TableMaintenanceReport};
pub use time_provider::TimeProvider;
