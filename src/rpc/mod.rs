//! RPC subsystem.
//!
//! # Data Flow
//! ```text
//! Node → RpcController ─┬─ RpcDial::Network   → HttpRpcClient → HTTP backend
//!                       └─ RpcDial::InProcess → service object in this process
//! ```
//!
//! # Design Decisions
//! - The dialer is chosen once at startup and carried in the RPC config
//! - Transport errors and 5xx responses are retried with backoff

pub mod client;
pub mod controller;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::resilience::Retryable;

pub use client::HttpRpcClient;
pub use controller::RpcController;
pub use types::{
    CommandMessage, CommandResponse, ConnectionRequest, ConnectionResponse, DisconnectRequest,
    DisconnectResponse,
};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Not implemented")]
    NotImplemented,

    #[error("RPC transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC backend responded with HTTP {0}")]
    Status(u16),

    #[error("RPC backend reported an error: {0}")]
    Application(String),
}

impl Retryable for RpcError {
    fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            RpcError::Status(code) => *code >= 500,
            RpcError::NotImplemented | RpcError::Application(_) => false,
        }
    }
}

/// Remote procedures the controller relies on.
#[async_trait]
pub trait RpcService: Send + Sync {
    async fn connect(&self, request: ConnectionRequest) -> Result<ConnectionResponse, RpcError>;

    async fn command(&self, request: CommandMessage) -> Result<CommandResponse, RpcError>;

    async fn disconnect(&self, request: DisconnectRequest) -> Result<DisconnectResponse, RpcError>;
}

/// Lifecycle hooks of an RPC endpoint.
#[async_trait]
pub trait ClientHandler: Send + Sync {
    /// Liveness probe: `Ok` when the endpoint can accept work.
    async fn ready(&self) -> Result<(), RpcError>;

    /// Release the endpoint. Idempotent.
    fn close(&self);
}

/// How the controller reaches its RPC implementation.
#[derive(Clone, Default)]
pub enum RpcDial {
    /// Over the network, using the configured URL.
    #[default]
    Network,
    /// Directly, without a socket hop.
    InProcess {
        service: Arc<dyn RpcService>,
        handler: Arc<dyn ClientHandler>,
    },
}

impl RpcDial {
    pub fn is_in_process(&self) -> bool {
        matches!(self, RpcDial::InProcess { .. })
    }
}

impl std::fmt::Debug for RpcDial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcDial::Network => f.write_str("Network"),
            RpcDial::InProcess { .. } => f.write_str("InProcess"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_errors() {
        assert!(RpcError::Status(503).is_retryable());
        assert!(!RpcError::Status(404).is_retryable());
        assert!(!RpcError::NotImplemented.is_retryable());
        assert!(!RpcError::Application("boom".into()).is_retryable());
    }

    #[test]
    fn network_is_the_default_dial() {
        assert!(!RpcDial::default().is_in_process());
        assert_eq!(format!("{:?}", RpcDial::default()), "Network");
    }
}
