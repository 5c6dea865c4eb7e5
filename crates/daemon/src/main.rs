//! JobQueue Daemon - Main Entry Point
//! Workers + reaper + JSON-RPC admin server over one SQLite database

mod config;
mod logging;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use config::DaemonConfig;
use jobqueue_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use jobqueue_core::application::worker::constants::DEFAULT_RECLAIM_INTERVAL;
use jobqueue_core::application::{
    shutdown_channel, HandlerRegistry, JobExecutor, JobQueue, Reaper, RetryPolicy,
    StuckJobReclaimer, Worker, WorkerConfig,
};
use jobqueue_core::port::id_provider::UuidProvider;
use jobqueue_core::port::time_provider::SystemTimeProvider;
use jobqueue_core::port::{IdProvider, Maintenance, TimeProvider};
use jobqueue_handlers::{register_builtin_handlers, BuiltinDeps, TracingTransport};
use jobqueue_infra_sqlite::{
    create_pool, database_url, run_migrations, SqliteJobRepository, SqliteMaintenance,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long in-flight jobs get to finish after Ctrl+C
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration, then logging
    let config = DaemonConfig::from_env()?;
    let _log_guard = logging::init(&config)?;

    info!("JobQueue daemon v{} starting...", VERSION);
    info!(db_path = %config.db_path.display(), "Initializing database...");

    // 2. Initialize database
    let url = database_url(&config.db_path)
        .map_err(|e| anyhow::anyhow!("Invalid database path: {}", e))?;
    let pool = create_pool(&url)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let id_provider: Arc<dyn IdProvider> = Arc::new(UuidProvider);
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone(), time_provider.clone()));
    let queue = Arc::new(JobQueue::new(job_repo, id_provider, time_provider.clone()));
    let maintenance: Arc<dyn Maintenance> =
        Arc::new(SqliteMaintenance::new(pool.clone(), time_provider.clone()));

    let mut registry = HandlerRegistry::new();
    register_builtin_handlers(
        &mut registry,
        BuiltinDeps {
            maintenance: maintenance.clone(),
            email_transport: Arc::new(TracingTransport),
            time_provider: time_provider.clone(),
            default_from: config.email_from.clone(),
        },
    );
    let registry = Arc::new(registry);
    info!(handlers = ?registry.registered_handlers(), "Handlers registered");

    let executor = Arc::new(JobExecutor::new(registry.clone()));
    let retry_policy = Arc::new(RetryPolicy::new(config.retry_base_delay_ms));

    // 4. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_handler = Arc::new(RpcHandler::new(queue.clone(), maintenance, registry));
    let rpc_server = RpcServer::new(
        RpcServerConfig {
            host: config.rpc_host.clone(),
            port: config.rpc_port,
        },
        rpc_handler,
    );
    let (rpc_addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 5. Start workers
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let worker_config = WorkerConfig {
        poll_interval: config.poll_interval,
        auto_retry: config.auto_retry,
    };

    info!(count = config.worker_count, "Starting workers...");
    let mut worker_handles = Vec::with_capacity(config.worker_count);
    for i in 0..config.worker_count {
        let worker = Worker::new(
            format!("worker-{}", i + 1),
            queue.clone(),
            executor.clone(),
            retry_policy.clone(),
            worker_config.clone(),
        );
        let token = shutdown_rx.clone();
        worker_handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(token).await {
                error!(error = ?e, "Worker failed");
            }
        }));
    }

    // 6. Background maintenance: reaper, and the reclaimer when a timeout is set
    let reaper = Reaper::new(queue.clone(), config.retention_days, config.reaper_interval);
    let reaper_handle = tokio::spawn(reaper.run(shutdown_rx.clone()));

    let reclaimer_handle = config.stuck_job_timeout.map(|timeout| {
        info!(timeout_secs = timeout.as_secs(), "Stuck-job reclaimer enabled");
        let reclaimer = StuckJobReclaimer::new(queue.clone(), timeout, DEFAULT_RECLAIM_INTERVAL);
        tokio::spawn(reclaimer.run(shutdown_rx.clone()))
    });

    info!(rpc_addr = %rpc_addr, "System ready. Waiting for jobs...");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown: stop intake, let in-flight jobs finish
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;

    let drained = tokio::time::timeout(
        SHUTDOWN_GRACE_PERIOD,
        futures::future::join_all(worker_handles),
    )
    .await;
    if drained.is_err() {
        error!(
            grace_secs = SHUTDOWN_GRACE_PERIOD.as_secs(),
            "Workers did not finish in time; abandoning in-flight jobs"
        );
    }

    let _ = reaper_handle.await;
    if let Some(handle) = reclaimer_handle {
        let _ = handle.await;
    }
    pool.close().await;

    info!("Shutdown complete.");

    Ok(())
}
