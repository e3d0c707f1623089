//! Disconnect notifications.
//!
//! When a session goes away the controller must hear about it, but a mass
//! reconnect (deploys, network blips) must not flood the backend. The queue
//! variant spreads notifications out at a fixed rate and drains what is left
//! on shutdown, within a deadline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use crate::config::DisconnectQueueConfig;
use crate::node::app::Node;
use crate::node::session::Session;
use crate::observability::metrics;
use crate::BoxError;

#[async_trait]
pub trait Disconnector: Send + Sync {
    /// Process notifications until shutdown.
    async fn run(&self) -> Result<(), BoxError>;

    async fn shutdown(&self) -> Result<(), BoxError>;

    fn enqueue(&self, session: Arc<Session>) -> Result<(), BoxError>;

    /// Notifications waiting to be sent.
    fn size(&self) -> usize;
}

/// Drops every notification.
#[derive(Debug, Default)]
pub struct NoopDisconnector;

impl NoopDisconnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Disconnector for NoopDisconnector {
    async fn run(&self) -> Result<(), BoxError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn enqueue(&self, _session: Arc<Session>) -> Result<(), BoxError> {
        Ok(())
    }

    fn size(&self) -> usize {
        0
    }
}

const MIN_PERIOD: Duration = Duration::from_nanos(1);

/// Rate-limited queue of disconnect notifications.
pub struct DisconnectQueue {
    node: Weak<Node>,
    tx: mpsc::UnboundedSender<Arc<Session>>,
    rx: Mutex<mpsc::UnboundedReceiver<Arc<Session>>>,
    pending: AtomicUsize,
    period: Duration,
    shutdown_timeout: Duration,
    closing: watch::Sender<bool>,
}

impl DisconnectQueue {
    pub fn new(node: &Arc<Node>, config: &DisconnectQueueConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            node: Arc::downgrade(node),
            tx,
            rx: Mutex::new(rx),
            pending: AtomicUsize::new(0),
            period: (Duration::from_secs(1) / config.rate.max(1)).max(MIN_PERIOD),
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
            closing: watch::channel(false).0,
        }
    }

    async fn notify(&self, session: Arc<Session>) {
        self.pending.fetch_sub(1, Ordering::AcqRel);

        let Some(node) = self.node.upgrade() else {
            return;
        };
        node.metrics()
            .gauge_set(metrics::DISCONNECT_QUEUE_SIZE, self.size() as u64);

        if let Err(e) = node.disconnect_now(&session).await {
            tracing::warn!(sid = session.id(), error = %e, "Disconnect notification failed");
        }
    }

    async fn drain(&self) {
        let mut rx = self.rx.lock().await;
        while let Ok(session) = rx.try_recv() {
            self.notify(session).await;
        }
    }
}

#[async_trait]
impl Disconnector for DisconnectQueue {
    async fn run(&self) -> Result<(), BoxError> {
        let mut closing = self.closing.subscribe();
        let mut rx = self.rx.lock().await;
        let mut ticker = tokio::time::interval(self.period);

        loop {
            tokio::select! {
                biased;
                _ = async { let _ = closing.wait_for(|closed| *closed).await; } => break,
                received = rx.recv() => {
                    let Some(session) = received else { break };
                    ticker.tick().await;
                    self.notify(session).await;
                }
            }
        }

        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        if self.closing.send_replace(true) {
            return Ok(());
        }

        let pending = self.size();
        if pending > 0 {
            tracing::info!(pending, "Invoking remaining disconnects");
        }

        if tokio::time::timeout(self.shutdown_timeout, self.drain())
            .await
            .is_err()
        {
            tracing::warn!(
                left = self.size(),
                "Disconnect queue drain timed out after {:?}",
                self.shutdown_timeout
            );
        }

        Ok(())
    }

    fn enqueue(&self, session: Arc<Session>) -> Result<(), BoxError> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(session).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            "disconnect queue is closed".into()
        })
    }

    fn size(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}
