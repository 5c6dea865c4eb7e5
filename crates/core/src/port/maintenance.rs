// DB Maintenance port
// Backs the table-maintenance handlers and the admin stats endpoint
use crate::error::Result;
use async_trait::async_trait;

/// Database statistics
#[derive(Debug, Clone)]
pub struct MaintenanceStats {
    pub db_size_bytes: i64,
    pub job_count: i64,
    pub finished_job_count: i64,
}

/// Which table operation ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceOperation {
    Analyze,
    Vacuum,
}

impl std::fmt::Display for MaintenanceOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaintenanceOperation::Analyze => write!(f, "ANALYZE"),
            MaintenanceOperation::Vacuum => write!(f, "VACUUM"),
        }
    }
}

/// Result of a single table maintenance run
#[derive(Debug, Clone)]
pub struct TableMaintenanceReport {
    pub table_name: String,
    pub operation: MaintenanceOperation,
    pub duration_ms: i64,
    pub row_count: i64,
}

/// Database maintenance operations
#[async_trait]
pub trait Maintenance: Send + Sync {
    /// Refresh planner statistics for one table
    ///
    /// # Errors
    /// `Validation` if the name is not a plain identifier, `NotFound` if the
    /// table does not exist
    async fn analyze_table(&self, table_name: &str) -> Result<TableMaintenanceReport>;

    /// Reclaim space for one table
    async fn vacuum_table(&self, table_name: &str) -> Result<TableMaintenanceReport>;

    /// Delete slow query log entries
    ///
    /// # Arguments
    /// * `older_than_millis` - Only delete entries recorded before this instant
    ///   (`None` purges everything)
    ///
    /// # Returns
    /// Number of entries deleted
    async fn purge_slow_query_logs(&self, older_than_millis: Option<i64>) -> Result<u64>;

    /// Get database statistics
    async fn get_stats(&self) -> Result<MaintenanceStats>;
}

/// True for names made only of ASCII letters, digits and underscores
/// (not starting with a digit)
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 128 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(is_valid_table_name("jobs"));
        assert!(is_valid_table_name("_slow_query_logs2"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("1jobs"));
        assert!(!is_valid_table_name("jobs; DROP TABLE jobs"));
        assert!(!is_valid_table_name("\"jobs\""));
    }
}
