//! JSON-RPC API Layer
//!
//! Administrative JSON-RPC 2.0 surface of the job queue: enqueue, inspect,
//! retry and clean up jobs. Bound to localhost TCP.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{RpcServer, RpcServerConfig};
