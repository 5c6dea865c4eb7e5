// JobQueue Infrastructure - SQLite Adapter
// Implements: JobRepository (job record store), Maintenance

mod connection;
mod error;
mod job_repository;
mod maintenance_impl;
mod migration;

pub use connection::{create_pool, database_url};
pub use job_repository::SqliteJobRepository;
pub use maintenance_impl::SqliteMaintenance;
pub use migration::run_migrations;

// sqlx::Error -> AppError goes through error::map_sqlx_error
// (orphan rules forbid `impl From<sqlx::Error> for AppError` here)
