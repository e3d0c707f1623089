//! Client sessions.
//!
//! A session is transport-agnostic: replies are encoded and pushed onto an
//! outbound queue that the websocket pump drains, and inbound frames are
//! handed to the session's executor.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::encoders::{EncodeError, Encoder, Frame};
use crate::node::types::{Reply, SessionEnv};
use crate::BoxError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("malformed frame: {0}")]
    Decode(#[from] EncodeError),

    #[error("session {0} is not authenticated")]
    Unauthenticated(String),

    #[error("controller call failed: {0}")]
    Controller(#[source] BoxError),
}

/// Something that reacts to inbound frames of a session.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn handle_frame(&self, session: &Arc<Session>, frame: Frame) -> Result<(), SessionError>;
}

/// Item drained by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Frame),
    Close { reason: String },
}

#[derive(Default)]
struct SessionState {
    identifiers: String,
    subscriptions: BTreeSet<String>,
    connected: bool,
}

pub struct Session {
    id: String,
    env: SessionEnv,
    encoder: Arc<dyn Encoder>,
    executor: Arc<dyn Executor>,
    state: Mutex<SessionState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: AtomicBool,
}

impl Session {
    /// Create a session and the queue its transport must drain.
    pub fn new(
        env: SessionEnv,
        encoder: Arc<dyn Encoder>,
        executor: Arc<dyn Executor>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id: uuid::Uuid::new_v4().to_string(),
            env,
            encoder,
            executor,
            state: Mutex::new(SessionState::default()),
            outbound: tx,
            closed: AtomicBool::new(false),
        });
        (session, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn env(&self) -> &SessionEnv {
        &self.env
    }

    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    pub fn identifiers(&self) -> String {
        self.state().identifiers.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    pub fn mark_connected(&self, identifiers: &str) {
        let mut state = self.state();
        state.identifiers = identifiers.to_string();
        state.connected = true;
    }

    /// Record a subscription. Returns `false` if it already existed.
    pub fn add_subscription(&self, identifier: &str) -> bool {
        self.state().subscriptions.insert(identifier.to_string())
    }

    pub fn remove_subscription(&self, identifier: &str) -> bool {
        self.state().subscriptions.remove(identifier)
    }

    pub fn has_subscription(&self, identifier: &str) -> bool {
        self.state().subscriptions.contains(identifier)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state().subscriptions.iter().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Encode and enqueue a reply. Dropped once the session is closed.
    pub fn send(&self, reply: &Reply) {
        if self.is_closed() {
            return;
        }

        match self.encoder.encode(reply) {
            Ok(Some(frame)) => {
                let _ = self.outbound.send(Outbound::Frame(frame));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(sid = %self.id, encoder = self.encoder.id(), error = %e, "Failed to encode reply");
            }
        }
    }

    /// Send a disconnect notice and ask the transport to close. Idempotent.
    pub fn close(&self, reason: &str, reconnect: bool) {
        self.send(&Reply::disconnect(reason, reconnect));

        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        tracing::debug!(sid = %self.id, reason, "Closing session");
        let _ = self.outbound.send(Outbound::Close {
            reason: reason.to_string(),
        });
    }

    /// Dispatch an inbound frame to the executor.
    pub async fn handle_frame(self: &Arc<Self>, frame: Frame) -> Result<(), SessionError> {
        let executor = self.executor.clone();
        executor.handle_frame(self, frame).await
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().expect("session mutex poisoned")
    }
}
