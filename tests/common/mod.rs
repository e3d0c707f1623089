//! Shared collaborators for runner and websocket integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use cable_gateway::config::GatewayConfig;
use cable_gateway::lifecycle::ShutdownState;
use cable_gateway::node::{
    Command, CommandKind, CommandResult, ConnectResult, Controller, Reply, SessionEnv, Status,
};
use cable_gateway::pubsub::{Handler, Subscriber};
use cable_gateway::{BoxError, Runner};

/// Configuration with every acceptor on an ephemeral loopback port.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config.broadcast.port = 0;
    config.ws_rpc.port = 0;
    config.disconnect_queue.disabled = true;
    config.logging.level = "warn".into();
    config
}

/// Controller answering every call locally.
///
/// Subscriptions are confirmed and streamed from `room`.
#[derive(Default)]
pub struct StubController {
    pub started: AtomicBool,
    pub stopped: AtomicBool,
    pub commands: Mutex<Vec<Command>>,
    pub disconnects: Mutex<Vec<String>>,
}

#[async_trait]
impl Controller for StubController {
    async fn start(&self) -> Result<(), BoxError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn authenticate(&self, sid: &str, env: &SessionEnv) -> Result<ConnectResult, BoxError> {
        if env.query_param("reject").is_some() {
            return Ok(ConnectResult::failure(vec![Reply::disconnect(
                "unauthorized",
                false,
            )]));
        }
        Ok(ConnectResult::success(
            r#"{"user":"alice"}"#,
            vec![Reply::welcome(sid)],
        ))
    }

    async fn command(
        &self,
        _sid: &str,
        _env: &SessionEnv,
        _identifiers: &str,
        command: &Command,
    ) -> Result<CommandResult, BoxError> {
        self.commands.lock().unwrap().push(command.clone());

        let mut result = CommandResult::new(Status::Success);
        if command.command == CommandKind::Subscribe {
            result.streams.push("room".into());
            result.transmissions.push(Reply::confirm(&command.identifier));
        }
        Ok(result)
    }

    async fn disconnect(
        &self,
        sid: &str,
        _env: &SessionEnv,
        _identifiers: &str,
        _subscriptions: &[String],
    ) -> Result<(), BoxError> {
        self.disconnects.lock().unwrap().push(sid.to_string());
        Ok(())
    }
}

/// How a [`StubSubscriber`] behaves.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run until shut down.
    Healthy,
    /// Fail right after starting.
    FailOnStart,
    /// Never finish shutting down.
    StuckOnShutdown,
}

pub struct StubSubscriber {
    mode: Mode,
    handler: Arc<dyn Handler>,
    closing: watch::Sender<bool>,
    pub shutdowns: AtomicUsize,
}

impl StubSubscriber {
    pub fn new(mode: Mode, handler: Arc<dyn Handler>) -> Self {
        Self {
            mode,
            handler,
            closing: watch::channel(false).0,
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub fn handler(&self) -> Arc<dyn Handler> {
        self.handler.clone()
    }
}

#[async_trait]
impl Subscriber for StubSubscriber {
    async fn start(&self) -> Result<(), BoxError> {
        if self.mode == Mode::FailOnStart {
            return Err("connection to broker lost".into());
        }
        let mut closing = self.closing.subscribe();
        let _ = closing.wait_for(|closed| *closed).await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.mode == Mode::StuckOnShutdown {
            std::future::pending::<()>().await;
        }
        self.closing.send_replace(true);
        Ok(())
    }
}

/// Collaborators handed to a runner, kept for inspection.
pub struct Harness {
    pub controller: Arc<StubController>,
    pub subscriber: Arc<Mutex<Option<Arc<StubSubscriber>>>>,
    pub triggers: mpsc::UnboundedSender<()>,
}

impl Harness {
    /// The subscriber built during startup, once the factory has run.
    pub async fn subscriber(&self) -> Arc<StubSubscriber> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(subscriber) = self.subscriber.lock().unwrap().clone() {
                    return subscriber;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber factory was never invoked")
    }

    pub fn trigger(&self) {
        self.triggers.send(()).expect("trigger source closed");
    }
}

/// Runner wired with stub collaborators and an injected trigger source.
pub fn runner(config: GatewayConfig, mode: Mode) -> (Runner, Harness) {
    let controller = Arc::new(StubController::default());
    let subscriber = Arc::new(Mutex::new(None));
    let (triggers, source) = mpsc::unbounded_channel();

    let mut runner = Runner::new("TestGateway", config);
    runner.set_termination_source(source);

    let built = controller.clone();
    let slot = subscriber.clone();
    runner
        .controller_factory(move |_, _| {
            let controller: Arc<dyn Controller> = built;
            Ok(controller)
        })
        .unwrap()
        .subscriber_factory(move |handler, _| {
            let stub = Arc::new(StubSubscriber::new(mode, handler));
            *slot.lock().unwrap() = Some(stub.clone());
            let subscriber: Arc<dyn Subscriber> = stub;
            Ok(subscriber)
        })
        .unwrap();

    (
        runner,
        Harness {
            controller,
            subscriber,
            triggers,
        },
    )
}

/// Wait until the observed shutdown state reaches `expected`.
pub async fn wait_for_state(state: &mut watch::Receiver<ShutdownState>, expected: ShutdownState) {
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == expected))
        .await
        .expect("shutdown state was not reached")
        .expect("shutdown state channel closed");
}

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub async fn connect(url: &str, protocol: Option<&'static str>) -> Client {
    for _ in 0..100 {
        let mut request = url.into_client_request().unwrap();
        if let Some(protocol) = protocol {
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(protocol));
        }
        if let Ok((client, _)) = tokio_tungstenite::connect_async(request).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("gateway at {} never accepted a connection", url);
}

/// Next JSON frame, skipping pings.
pub async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("no frame received")
            .expect("connection ended")
            .expect("read failed");

        match message {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if value["type"] == "ping" {
                    continue;
                }
                return value;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {:?}", other),
        }
    }
}

pub async fn send(client: &mut Client, value: Value) {
    client
        .send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}
