//! Two-stage shutdown coordination.
//!
//! ```text
//! Running ──first trigger──▶ GracefulShutdown ──sweep done or second trigger──▶ ForcedShutdown
//! ```
//!
//! Triggers are injected as an mpsc stream so tests never need real OS
//! signals (see `signals.rs` for the production source).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::lifecycle::faults::FaultReporter;
use crate::BoxError;

/// A subsystem that owns resources released on demand.
#[async_trait]
pub trait Shutdownable: Send + Sync {
    /// Identity used in shutdown logs.
    fn name(&self) -> &str;

    /// Stop the subsystem and release its resources.
    async fn shutdown(&self) -> Result<(), BoxError>;
}

/// Process-level shutdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    GracefulShutdown,
    ForcedShutdown,
}

/// Drives the graceful/forced shutdown state machine.
pub struct ShutdownCoordinator {
    shutdownables: Vec<Arc<dyn Shutdownable>>,
    state: watch::Sender<ShutdownState>,
}

impl ShutdownCoordinator {
    pub fn new(
        shutdownables: Vec<Arc<dyn Shutdownable>>,
        state: watch::Sender<ShutdownState>,
    ) -> Self {
        Self {
            shutdownables,
            state,
        }
    }

    /// Current state.
    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Stop every shutdownable in registration order.
    ///
    /// Failures are logged and returned; they never stop the sweep.
    pub async fn sweep(&self) -> Vec<(String, BoxError)> {
        let mut failures = Vec::new();

        for subsystem in &self.shutdownables {
            tracing::debug!(subsystem = subsystem.name(), "Shutting down");
            if let Err(e) = subsystem.shutdown().await {
                tracing::error!(
                    subsystem = subsystem.name(),
                    error = %e,
                    "{} shutdown failed",
                    subsystem.name()
                );
                failures.push((subsystem.name().to_string(), e));
            }
        }

        failures
    }

    /// Wait for triggers and run the shutdown protocol.
    ///
    /// Reports a clean outcome once the sweep finishes or a second trigger
    /// arrives. Returns without reporting if the trigger source closes first.
    pub async fn run(self, mut triggers: mpsc::UnboundedReceiver<()>, reporter: FaultReporter) {
        if triggers.recv().await.is_none() {
            tracing::debug!("Shutdown trigger source closed");
            return;
        }

        self.state.send_replace(ShutdownState::GracefulShutdown);
        tracing::info!("Shutting down... (hit Ctrl-C again to stop immediately)");

        tokio::select! {
            failures = self.sweep() => {
                if !failures.is_empty() {
                    tracing::warn!(failed = failures.len(), "Graceful shutdown completed with errors");
                }
            }
            Some(()) = triggers.recv() => {
                tracing::warn!("Immediate shutdown requested, abandoning graceful shutdown");
            }
        }

        self.state.send_replace(ShutdownState::ForcedShutdown);
        reporter.clean();
    }
}
