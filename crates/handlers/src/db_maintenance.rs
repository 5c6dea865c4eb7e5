// Database maintenance handlers (purge, analyze, vacuum)

use async_trait::async_trait;
use jobqueue_core::domain::JobPayload;
use jobqueue_core::error::AppError;
use jobqueue_core::application::queue::MAX_RETENTION_DAYS;
use jobqueue_core::port::time_provider::{days_before, to_rfc3339};
use jobqueue_core::port::{HandlerError, JobHandler, Maintenance, MaintenanceOperation, TimeProvider};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

fn maintenance_error(err: AppError) -> HandlerError {
    match err {
        AppError::Validation(msg) | AppError::NotFound(msg) => HandlerError::InvalidPayload(msg),
        other => HandlerError::Failed(other.to_string()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PurgeRequest {
    older_than_days: Option<i64>,
}

/// Deletes slow query log entries, optionally only those older than N days
pub struct PurgeSlowQueryLogsHandler {
    maintenance: Arc<dyn Maintenance>,
    time_provider: Arc<dyn TimeProvider>,
}

impl PurgeSlowQueryLogsHandler {
    pub fn new(maintenance: Arc<dyn Maintenance>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            maintenance,
            time_provider,
        }
    }
}

#[async_trait]
impl JobHandler for PurgeSlowQueryLogsHandler {
    async fn handle(&self, payload: &JobPayload) -> Result<Value, HandlerError> {
        // Any payload shape is accepted; only olderThanDays is read
        let req: PurgeRequest = match payload.as_value() {
            Value::Null => PurgeRequest::default(),
            value => serde_json::from_value(value.clone())?,
        };

        let now = self.time_provider.now_millis();
        let cutoff = match req.older_than_days {
            Some(days) if !(0..=MAX_RETENTION_DAYS).contains(&days) => {
                return Err(HandlerError::InvalidPayload(format!(
                    "olderThanDays must be between 0 and {}, got {}",
                    MAX_RETENTION_DAYS, days
                )))
            }
            Some(days) => Some(days_before(now, days).ok_or_else(|| {
                HandlerError::InvalidPayload(format!("olderThanDays {} is out of range", days))
            })?),
            None => None,
        };

        let deleted = self
            .maintenance
            .purge_slow_query_logs(cutoff)
            .await
            .map_err(maintenance_error)?;

        Ok(json!({
            "deletedCount": deleted,
            "purgedAt": to_rfc3339(now),
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableRequest {
    table_name: String,
}

/// ANALYZE or VACUUM one table
pub struct TableMaintenanceHandler {
    maintenance: Arc<dyn Maintenance>,
    operation: MaintenanceOperation,
    time_provider: Arc<dyn TimeProvider>,
}

impl TableMaintenanceHandler {
    pub fn new(
        maintenance: Arc<dyn Maintenance>,
        operation: MaintenanceOperation,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            maintenance,
            operation,
            time_provider,
        }
    }
}

#[async_trait]
impl JobHandler for TableMaintenanceHandler {
    async fn handle(&self, payload: &JobPayload) -> Result<Value, HandlerError> {
        let req: TableRequest = serde_json::from_value(payload.as_value().clone())?;
        if req.table_name.is_empty() {
            return Err(HandlerError::missing_field("tableName"));
        }

        let report = match self.operation {
            MaintenanceOperation::Analyze => self.maintenance.analyze_table(&req.table_name).await,
            MaintenanceOperation::Vacuum => self.maintenance.vacuum_table(&req.table_name).await,
        }
        .map_err(maintenance_error)?;

        Ok(json!({
            "tableName": report.table_name,
            "operation": report.operation.to_string(),
            "duration": report.duration_ms,
            "rowCount": report.row_count,
            "completedAt": to_rfc3339(self.time_provider.now_millis()),
        }))
    }
}
