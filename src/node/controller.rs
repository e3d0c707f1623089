//! Controller contract: the business-logic backend sessions talk to.

use async_trait::async_trait;

use crate::node::types::{Command, CommandResult, ConnectResult, SessionEnv};
use crate::BoxError;

#[async_trait]
pub trait Controller: Send + Sync {
    /// Launch background work (keepalives, connection warmup).
    async fn start(&self) -> Result<(), BoxError>;

    async fn shutdown(&self) -> Result<(), BoxError>;

    /// Decide whether a new session may connect.
    async fn authenticate(&self, sid: &str, env: &SessionEnv) -> Result<ConnectResult, BoxError>;

    /// Execute a subscribe, unsubscribe or message command.
    async fn command(
        &self,
        sid: &str,
        env: &SessionEnv,
        identifiers: &str,
        command: &Command,
    ) -> Result<CommandResult, BoxError>;

    /// Notify the backend that a session went away.
    async fn disconnect(
        &self,
        sid: &str,
        env: &SessionEnv,
        identifiers: &str,
        subscriptions: &[String],
    ) -> Result<(), BoxError>;
}
