//! WebSocket session handling.
//!
//! # Responsibilities
//! - Complete the upgrade handshake and negotiate the subprotocol
//! - Enforce the per-handler connection limit
//! - Build a session (encoder + executor) for the negotiated protocol
//! - Pump outbound replies and inbound frames until either side closes
//!
//! # Data Flow
//! ```text
//! Client ──frames──▶ reader ──▶ [poller permit] ──▶ Session::handle_frame
//! Client ◀──frames── writer ◀── outbound queue ◀── Session::send
//! ```

use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use futures_util::{SinkExt, StreamExt};

use crate::encoders::{Encoder, Frame};
use crate::http::server::ServerOptions;
use crate::net::{ConnectionGuard, ConnectionTracker};
use crate::netpoll::Poller;
use crate::node::{Executor, Node, Outbound, Session, SessionEnv};

/// Per-connection wiring chosen after the subprotocol is known.
pub struct SessionSetup {
    pub encoder: Arc<dyn Encoder>,
    pub executor: Arc<dyn Executor>,
    /// Authenticate against the controller right after the upgrade.
    pub authenticate: bool,
}

type SetupFn = dyn Fn(Option<&str>) -> SessionSetup + Send + Sync;

#[derive(Clone)]
pub struct WebsocketHandler {
    node: Arc<Node>,
    poller: Option<Arc<Poller>>,
    tracker: ConnectionTracker,
    headers: Arc<Vec<String>>,
    protocols: Vec<&'static str>,
    setup: Arc<SetupFn>,
}

impl WebsocketHandler {
    pub fn new<F>(node: Arc<Node>, options: &ServerOptions, headers: &[String], setup: F) -> Self
    where
        F: Fn(Option<&str>) -> SessionSetup + Send + Sync + 'static,
    {
        Self {
            node,
            poller: None,
            tracker: ConnectionTracker::new(options.max_conn),
            headers: Arc::new(headers.iter().map(|h| h.to_ascii_lowercase()).collect()),
            protocols: Vec::new(),
            setup: Arc::new(setup),
        }
    }

    /// Subprotocols offered during the handshake, in preference order.
    pub fn with_protocols(mut self, protocols: &[&'static str]) -> Self {
        self.protocols = protocols.to_vec();
        self
    }

    /// Gate inbound frame handling through a shared poller.
    pub fn with_poller(mut self, poller: Option<Arc<Poller>>) -> Self {
        self.poller = poller;
        self
    }

    pub fn into_route(self) -> MethodRouter {
        get(
            move |ws: WebSocketUpgrade, uri: Uri, headers: HeaderMap| {
                let handler = self.clone();
                async move { handler.upgrade(ws, uri, headers) }
            },
        )
    }

    fn upgrade(self, ws: WebSocketUpgrade, uri: Uri, headers: HeaderMap) -> Response {
        let Some(guard) = self.tracker.try_track() else {
            tracing::warn!(
                active = self.tracker.active_count(),
                "Connection limit reached, rejecting upgrade"
            );
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        };

        let env = self.env(&uri, &headers);
        let protocols = self.protocols.clone();

        ws.protocols(protocols)
            .on_upgrade(move |socket| async move { self.serve(socket, env, guard).await })
    }

    fn env(&self, uri: &Uri, headers: &HeaderMap) -> SessionEnv {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");

        let mut env = SessionEnv::new(format!("http://{}{}", host, uri));
        for name in self.headers.iter() {
            if let Some(value) = headers.get(name.as_str()).and_then(|v| v.to_str().ok()) {
                env.headers.insert(name.clone(), value.to_string());
            }
        }
        env
    }

    async fn serve(self, socket: WebSocket, env: SessionEnv, guard: ConnectionGuard) {
        let protocol = socket
            .protocol()
            .and_then(|p| p.to_str().ok())
            .map(str::to_owned);
        let setup = (self.setup)(protocol.as_deref());

        let (session, mut outbound) = Session::new(env, setup.encoder, setup.executor);
        tracing::debug!(
            connection_id = %guard.id(),
            sid = session.id(),
            protocol = protocol.as_deref().unwrap_or("none"),
            "WebSocket session opened"
        );

        if setup.authenticate {
            if let Err(e) = self.node.authenticate(&session).await {
                tracing::error!(sid = session.id(), error = %e, "Authentication failed");
            }
        }

        let (mut sink, mut stream) = socket.split();

        let writer = async {
            while let Some(item) = outbound.recv().await {
                let message = match item {
                    Outbound::Frame(Frame::Text(text)) => Message::Text(text.into()),
                    Outbound::Frame(Frame::Binary(bytes)) => Message::Binary(bytes.into()),
                    Outbound::Close { reason } => {
                        let _ = sink
                            .send(Message::Close(Some(CloseFrame {
                                code: close_code::NORMAL,
                                reason: reason.into(),
                            })))
                            .await;
                        break;
                    }
                };
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        };

        let reader = async {
            while let Some(received) = stream.next().await {
                let frame = match received {
                    Ok(Message::Text(text)) => Frame::Text(text.as_str().to_owned()),
                    Ok(Message::Binary(bytes)) => Frame::Binary(bytes.to_vec()),
                    Ok(Message::Close(_)) => break,
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                    Err(e) => {
                        tracing::debug!(sid = session.id(), error = %e, "WebSocket read failed");
                        break;
                    }
                };

                let _permit = match &self.poller {
                    Some(poller) => poller.ready().await.ok(),
                    None => None,
                };

                if let Err(e) = session.handle_frame(frame).await {
                    tracing::warn!(sid = session.id(), error = %e, "Failed to handle frame");
                }
            }
        };

        tokio::select! {
            _ = writer => {}
            _ = reader => {}
        }

        self.node.disconnect(&session);
        tracing::debug!(connection_id = %guard.id(), sid = session.id(), "WebSocket session closed");
    }
}
