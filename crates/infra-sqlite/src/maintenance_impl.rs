// SQLite Maintenance Implementation
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use jobqueue_core::error::{AppError, Result};
use jobqueue_core::port::maintenance::is_valid_table_name;
use jobqueue_core::port::{
    Maintenance, MaintenanceOperation, MaintenanceStats, TableMaintenanceReport, TimeProvider,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Append an entry to the slow query log
    pub async fn record_slow_query(&self, query: &str, duration_ms: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO slow_query_logs (query, duration_ms, recorded_at) VALUES (?, ?, ?)",
        )
        .bind(query)
        .bind(duration_ms)
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Get DB size in bytes
    async fn get_db_size(&self) -> Result<i64> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(page_count * page_size)
    }

    /// Validate the identifier and make sure the table exists.
    ///
    /// Table names cannot be bound as parameters, so only names that pass
    /// both checks are ever interpolated into SQL.
    async fn checked_table(&self, table_name: &str) -> Result<()> {
        if !is_valid_table_name(table_name) {
            return Err(AppError::Validation(format!(
                "Invalid table name '{}'",
                table_name
            )));
        }

        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if exists == 0 {
            return Err(AppError::NotFound(format!(
                "Table '{}' does not exist",
                table_name
            )));
        }
        Ok(())
    }

    async fn row_count(&self, table_name: &str) -> Result<i64> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table_name))
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn run_table_operation(
        &self,
        table_name: &str,
        operation: MaintenanceOperation,
    ) -> Result<TableMaintenanceReport> {
        self.checked_table(table_name).await?;

        let started = Instant::now();
        let statement = match operation {
            MaintenanceOperation::Analyze => format!("ANALYZE \"{}\"", table_name),
            // SQLite has no per-table VACUUM; this rebuilds the whole file
            MaintenanceOperation::Vacuum => "VACUUM".to_string(),
        };
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let duration_ms = started.elapsed().as_millis() as i64;

        let row_count = self.row_count(table_name).await?;

        info!(
            table = %table_name,
            operation = %operation,
            duration_ms = duration_ms,
            row_count = row_count,
            "Table maintenance completed"
        );

        Ok(TableMaintenanceReport {
            table_name: table_name.to_string(),
            operation,
            duration_ms,
            row_count,
        })
    }
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn analyze_table(&self, table_name: &str) -> Result<TableMaintenanceReport> {
        self.run_table_operation(table_name, MaintenanceOperation::Analyze)
            .await
    }

    async fn vacuum_table(&self, table_name: &str) -> Result<TableMaintenanceReport> {
        self.run_table_operation(table_name, MaintenanceOperation::Vacuum)
            .await
    }

    async fn purge_slow_query_logs(&self, older_than_millis: Option<i64>) -> Result<u64> {
        let result = match older_than_millis {
            Some(cutoff) => sqlx::query("DELETE FROM slow_query_logs WHERE recorded_at < ?")
                .bind(cutoff)
                .execute(&self.pool)
                .await,
            None => sqlx::query("DELETE FROM slow_query_logs")
                .execute(&self.pool)
                .await,
        }
        .map_err(map_sqlx_error)?;

        let deleted = result.rows_affected();
        info!(
            deleted = deleted,
            cutoff = ?older_than_millis,
            "Slow query logs purged"
        );
        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let db_size_bytes = self.get_db_size().await?;

        let job_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let finished_job_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE status IN ('COMPLETED', 'FAILED')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(MaintenanceStats {
            db_size_bytes,
            job_count,
            finished_job_count,
        })
    }
}
