//! Application node: the dispatch core every session is attached to.
//!
//! # Responsibilities
//! - Authenticate new sessions through the controller
//! - Execute client commands and apply their stream changes to the hub
//! - Fan broadcasts out to subscribed sessions
//! - Ping connected sessions periodically
//! - Tear sessions down on shutdown and hand disconnects to the disconnector

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::encoders::Frame;
use crate::lifecycle::Shutdownable;
use crate::node::controller::Controller;
use crate::node::disconnector::{Disconnector, NoopDisconnector};
use crate::node::hub::Hub;
use crate::node::session::{Executor, Session, SessionError};
use crate::node::types::{
    Command, CommandKind, CommandResult, ConnectResult, Reply, Status, StreamMessage,
};
use crate::observability::metrics::{self, Metrics};
use crate::pool::WorkerPool;
use crate::pubsub::Handler;
use crate::BoxError;

const BROADCAST_POOL_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node is already started")]
    AlreadyStarted,
}

pub struct Node {
    controller: Arc<dyn Controller>,
    metrics: Arc<Metrics>,
    hub: Hub,
    sessions: DashMap<String, Arc<Session>>,
    disconnector: RwLock<Arc<dyn Disconnector>>,
    rpc_pool: WorkerPool,
    broadcast_pool: WorkerPool,
    ping_interval: Duration,
    started: AtomicBool,
    closing: watch::Sender<bool>,
}

impl Node {
    pub fn new(controller: Arc<dyn Controller>, metrics: Arc<Metrics>, config: &AppConfig) -> Self {
        Self {
            controller,
            metrics,
            hub: Hub::new(),
            sessions: DashMap::new(),
            disconnector: RwLock::new(Arc::new(NoopDisconnector::new())),
            rpc_pool: WorkerPool::new("rpc", config.rpc_concurrency),
            broadcast_pool: WorkerPool::new("broadcast", BROADCAST_POOL_SIZE),
            ping_interval: Duration::from_secs(config.ping_interval_secs.max(1)),
            started: AtomicBool::new(false),
            closing: watch::channel(false).0,
        }
    }

    /// Launch the ping loop.
    pub fn start(self: &Arc<Self>) -> Result<(), NodeError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(NodeError::AlreadyStarted);
        }

        let node = self.clone();
        let mut closing = self.closing.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(node.ping_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => node.ping(),
                    _ = async { let _ = closing.wait_for(|closed| *closed).await; } => break,
                }
            }
        });

        Ok(())
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn pools(&self) -> [&WorkerPool; 2] {
        [&self.rpc_pool, &self.broadcast_pool]
    }

    pub fn sessions_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn set_disconnector(&self, disconnector: Arc<dyn Disconnector>) {
        *self.disconnector.write().expect("disconnector lock poisoned") = disconnector;
    }

    fn disconnector(&self) -> Arc<dyn Disconnector> {
        self.disconnector
            .read()
            .expect("disconnector lock poisoned")
            .clone()
    }

    /// Ask the controller whether the session may connect.
    pub async fn authenticate(&self, session: &Arc<Session>) -> Result<ConnectResult, SessionError> {
        // The pool semaphore is never closed.
        let _permit = self.rpc_pool.acquire().await.ok();
        self.metrics.counter_increment(metrics::RPC_CALLS);

        let result = match self.controller.authenticate(session.id(), session.env()).await {
            Ok(result) => result,
            Err(e) => {
                self.metrics.counter_increment(metrics::RPC_ERRORS);
                session.close("server_error", true);
                return Err(SessionError::Controller(e));
            }
        };

        for reply in &result.transmissions {
            session.send(reply);
        }

        if result.status == Status::Success {
            session.mark_connected(&result.identifiers);
            self.sessions.insert(session.id().to_string(), session.clone());
            self.metrics
                .gauge_set(metrics::CLIENTS_NUM, self.sessions.len() as u64);
            tracing::debug!(sid = session.id(), "Session authenticated");
        } else {
            self.metrics.counter_increment(metrics::FAILED_AUTHS);
            session.close("unauthorized", false);
        }

        Ok(result)
    }

    /// Execute a client command on behalf of a session.
    pub async fn handle_command(
        &self,
        session: &Arc<Session>,
        command: &Command,
    ) -> Result<(), SessionError> {
        if !session.is_connected() {
            return Err(SessionError::Unauthenticated(session.id().to_string()));
        }
        self.metrics.counter_increment(metrics::CLIENT_MSG);

        match command.command {
            CommandKind::Subscribe => {
                if session.has_subscription(&command.identifier) {
                    tracing::debug!(sid = session.id(), identifier = %command.identifier, "Already subscribed");
                    return Ok(());
                }
            }
            CommandKind::Unsubscribe => {
                if !session.remove_subscription(&command.identifier) {
                    tracing::debug!(sid = session.id(), identifier = %command.identifier, "Unknown subscription");
                    return Ok(());
                }
                self.hub.unsubscribe_all(session.id(), &command.identifier);
            }
            CommandKind::Message => {
                if !session.has_subscription(&command.identifier) {
                    tracing::warn!(sid = session.id(), identifier = %command.identifier, "Message to unknown subscription");
                    return Ok(());
                }
            }
            CommandKind::Unknown => {
                tracing::warn!(sid = session.id(), "Unknown command");
                return Ok(());
            }
        }

        let _permit = self.rpc_pool.acquire().await.ok();
        self.metrics.counter_increment(metrics::RPC_CALLS);

        let result = self
            .controller
            .command(
                session.id(),
                session.env(),
                &session.identifiers(),
                command,
            )
            .await
            .map_err(|e| {
                self.metrics.counter_increment(metrics::RPC_ERRORS);
                SessionError::Controller(e)
            })?;

        if command.command == CommandKind::Subscribe && result.status == Status::Success {
            session.add_subscription(&command.identifier);
        }

        self.apply(session, &command.identifier, &result);
        Ok(())
    }

    fn apply(&self, session: &Arc<Session>, identifier: &str, result: &CommandResult) {
        if result.stop_all_streams {
            self.hub.unsubscribe_all(session.id(), identifier);
        }
        for stream in &result.stopped_streams {
            self.hub.unsubscribe(session.id(), identifier, stream);
        }
        if session.has_subscription(identifier) {
            for stream in &result.streams {
                self.hub.subscribe(session.id(), identifier, stream);
            }
        }

        for reply in &result.transmissions {
            session.send(reply);
        }

        if result.disconnect {
            session.close("remote", true);
        }
    }

    /// Detach a session whose transport went away. Idempotent.
    pub fn disconnect(&self, session: &Arc<Session>) {
        if self.sessions.remove(session.id()).is_none() {
            return;
        }

        self.hub.remove_session(session.id());
        self.metrics
            .gauge_set(metrics::CLIENTS_NUM, self.sessions.len() as u64);

        if let Err(e) = self.disconnector().enqueue(session.clone()) {
            tracing::warn!(sid = session.id(), error = %e, "Failed to enqueue disconnect");
        }
    }

    /// Notify the controller about a disconnected session right away.
    pub async fn disconnect_now(&self, session: &Session) -> Result<(), BoxError> {
        let _permit = self.rpc_pool.acquire().await.ok();
        self.metrics.counter_increment(metrics::RPC_CALLS);

        self.controller
            .disconnect(
                session.id(),
                session.env(),
                &session.identifiers(),
                &session.subscriptions(),
            )
            .await
            .inspect_err(|_| self.metrics.counter_increment(metrics::RPC_ERRORS))
    }

    fn ping(&self) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let reply = Reply::ping(timestamp);

        for session in self.sessions.iter() {
            session.send(&reply);
        }
    }

    /// Close every session, drain the disconnector, then stop the controller.
    pub async fn shutdown(&self) -> Result<(), BoxError> {
        if self.closing.send_replace(true) {
            return Ok(());
        }

        let sessions: Vec<_> = self.sessions.iter().map(|s| s.value().clone()).collect();
        if !sessions.is_empty() {
            tracing::info!(sessions = sessions.len(), "Closing active sessions");
        }
        for session in &sessions {
            session.close("server_restart", true);
            self.disconnect(session);
        }

        let drained = self.disconnector().shutdown().await;

        if let Err(e) = self.controller.shutdown().await {
            tracing::error!(error = %e, "Failed to shut down controller");
        }

        drained
    }
}

impl Handler for Node {
    fn broadcast(&self, message: StreamMessage) {
        self.metrics.counter_increment(metrics::BROADCAST_MSG);

        let subscribers = self.hub.subscribers(&message.stream);
        if subscribers.is_empty() {
            tracing::debug!(stream = %message.stream, "No sessions subscribed to stream");
            return;
        }

        let payload = serde_json::from_str(&message.data)
            .unwrap_or_else(|_| Value::String(message.data.clone()));

        let targets: Vec<_> = subscribers
            .into_iter()
            .filter_map(|(sid, identifier)| {
                self.sessions
                    .get(&sid)
                    .map(|session| (session.value().clone(), identifier))
            })
            .collect();

        self.broadcast_pool.spawn(async move {
            for (session, identifier) in targets {
                let mut reply = Reply::message(&identifier, payload.clone());
                reply.stream_id = Some(message.stream.clone());
                session.send(&reply);
            }
        });
    }
}

#[async_trait]
impl Executor for Node {
    async fn handle_frame(&self, session: &Arc<Session>, frame: Frame) -> Result<(), SessionError> {
        let command = session.encoder().decode(&frame)?;
        self.handle_command(session, &command).await
    }
}

#[async_trait]
impl Shutdownable for Node {
    fn name(&self) -> &str {
        "node"
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        Node::shutdown(self).await
    }
}
