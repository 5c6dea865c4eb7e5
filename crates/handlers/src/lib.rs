// JobQueue Built-in Handlers
// Implements: JobHandler for the job types registered by the daemon

pub mod db_maintenance;
pub mod email;
pub mod report;

pub use db_maintenance::{PurgeSlowQueryLogsHandler, TableMaintenanceHandler};
pub use email::{EmailMessage, EmailSendingHandler, EmailTransport, TracingTransport};
pub use report::ReportGenerationHandler;

use jobqueue_core::application::HandlerRegistry;
use jobqueue_core::port::{Maintenance, MaintenanceOperation, TimeProvider};
use std::sync::Arc;

pub const REPORT_GENERATION: &str = "report_generation";
pub const EMAIL_SENDING: &str = "email_sending";
pub const PURGE_SLOW_QUERY_LOGS: &str = "purge_slow_query_logs";
pub const ANALYZE_TABLE: &str = "analyze_table";
pub const VACUUM_TABLE: &str = "vacuum_table";

/// Everything the built-in handlers need from the outside
pub struct BuiltinDeps {
    pub maintenance: Arc<dyn Maintenance>,
    pub email_transport: Arc<dyn EmailTransport>,
    pub time_provider: Arc<dyn TimeProvider>,
    /// Sender used when an email payload has no `from`
    pub default_from: String,
}

/// Register the five built-in job types
pub fn register_builtin_handlers(registry: &mut HandlerRegistry, deps: BuiltinDeps) {
    registry.register(
        REPORT_GENERATION,
        Arc::new(ReportGenerationHandler::new(deps.time_provider.clone())),
    );
    registry.register(
        EMAIL_SENDING,
        Arc::new(EmailSendingHandler::new(
            deps.email_transport,
            deps.default_from,
            deps.time_provider.clone(),
        )),
    );
    registry.register(
        PURGE_SLOW_QUERY_LOGS,
        Arc::new(PurgeSlowQueryLogsHandler::new(
            deps.maintenance.clone(),
            deps.time_provider.clone(),
        )),
    );
    registry.register(
        ANALYZE_TABLE,
        Arc::new(TableMaintenanceHandler::new(
            deps.maintenance.clone(),
            MaintenanceOperation::Analyze,
            deps.time_provider.clone(),
        )),
    );
    registry.register(
        VACUUM_TABLE,
        Arc::new(TableMaintenanceHandler::new(
            deps.maintenance,
            MaintenanceOperation::Vacuum,
            deps.time_provider,
        )),
    );
}
