//! Shared network poller.
//!
//! When enabled, every websocket session hands its inbound frames to the
//! poller instead of processing them inline, so the number of frames being
//! handled at once is bounded across the whole process.

use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit};

use crate::config::AppConfig;
use crate::pool::WorkerPool;

#[derive(Debug)]
pub struct Poller {
    workers: WorkerPool,
}

impl Poller {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: WorkerPool::new("netpoll", workers),
        }
    }

    /// Poller for the given settings, `None` when disabled.
    pub fn from_config(config: &AppConfig) -> Option<Arc<Self>> {
        config
            .netpoll_enabled
            .then(|| Arc::new(Self::new(config.netpoll_workers)))
    }

    /// Reserve a slot for handling one inbound frame.
    pub async fn ready(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        self.workers.acquire().await
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default() {
        assert!(Poller::from_config(&AppConfig::default()).is_none());
    }

    #[tokio::test]
    async fn bounds_inflight_frames() {
        let poller = Poller::from_config(&AppConfig {
            netpoll_enabled: true,
            netpoll_workers: 1,
            ..AppConfig::default()
        })
        .unwrap();

        let first = poller.ready().await.unwrap();
        assert_eq!(poller.pool().busy(), 1);
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), poller.ready())
            .await
            .is_err());
        drop(first);
        assert!(poller.ready().await.is_ok());
    }
}
