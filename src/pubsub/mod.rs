//! Pub/sub subsystem.
//!
//! Subscribers receive broadcasts from the outside world and hand them to a
//! [`Handler`] (the application node).

pub mod http;

use async_trait::async_trait;

use crate::node::StreamMessage;
use crate::BoxError;

pub use self::http::HttpSubscriber;

/// Receives broadcasts.
pub trait Handler: Send + Sync {
    fn broadcast(&self, message: StreamMessage);
}

#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Run until shut down. Returning an error is fatal for the process.
    async fn start(&self) -> Result<(), BoxError>;

    async fn shutdown(&self) -> Result<(), BoxError>;
}
