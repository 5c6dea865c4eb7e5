//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP on localhost TCP.

use crate::handler::RpcHandler;
use crate::types::{
    CleanupRequest, EnqueueRequest, GetJobRequest, ListJobsRequest, RetryRequest,
};
use jobqueue_core::error::{AppError, Result};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
pub const DEFAULT_RPC_PORT: u16 = 9627;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: Arc<RpcHandler>) -> Self {
        Self { config, handler }
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the server handle.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind RPC server on {}: {}", addr, e)))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| AppError::Internal(format!("RPC server has no local address: {}", e)))?;

        let module = build_module(self.handler)?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started successfully");
        Ok((local_addr, handle))
    }
}

fn register_err(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("Failed to register RPC method: {}", e))
}

/// Register every method on a fresh module
pub fn build_module(handler: Arc<RpcHandler>) -> Result<RpcModule<()>> {
    let mut module = RpcModule::new(());

    let h = handler.clone();
    module
        .register_async_method("jobs.enqueue.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: EnqueueRequest = params.parse()?;
                handler.enqueue(req).await
            }
        })
        .map_err(register_err)?;

    let h = handler.clone();
    module
        .register_async_method("jobs.get.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: GetJobRequest = params.parse()?;
                handler.get_job(req).await
            }
        })
        .map_err(register_err)?;

    let h = handler.clone();
    module
        .register_async_method("jobs.list.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: ListJobsRequest = params.parse()?;
                handler.list_jobs(req).await
            }
        })
        .map_err(register_err)?;

    let h = handler.clone();
    module
        .register_async_method("jobs.retry.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                let req: RetryRequest = params.parse()?;
                handler.retry(req).await
            }
        })
        .map_err(register_err)?;

    // Admin APIs
    let h = handler.clone();
    module
        .register_async_method("admin.cleanup.v1", move |params, _, _| {
            let handler = h.clone();
            async move {
                // All fields optional: no params means defaults
                let req: CleanupRequest = if params.is_object() {
                    params.parse()?
                } else {
                    CleanupRequest {
                        older_than_days: jobqueue_core::application::queue::DEFAULT_RETENTION_DAYS,
                    }
                };
                handler.cleanup(req).await
            }
        })
        .map_err(register_err)?;

    let h = handler.clone();
    module
        .register_async_method("admin.stats.v1", move |_, _, _| {
            let handler = h.clone();
            async move { handler.stats().await }
        })
        .map_err(register_err)?;

    let h = handler;
    module
        .register_method("admin.handlers.v1", move |_, _, _| {
            Ok::<_, ErrorObjectOwned>(h.handlers())
        })
        .map_err(register_err)?;

    Ok(module)
}
