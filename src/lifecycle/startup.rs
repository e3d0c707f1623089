//! Startup orchestration.
//!
//! # Responsibilities
//! - Hold the pluggable factories and substitute defaults for absent ones
//! - Initialize all subsystems in dependency order
//! - Launch long-lived subsystems as background tasks tied to one fault channel
//! - Hand the registered shutdownables to the shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and returned synchronously
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)
//! - `run` consumes the runner, so factories cannot change after startup

use std::sync::Arc;

use async_trait::async_trait;
use axum::routing::{get, MethodRouter};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::apollo::{self, ApolloEncoder, ApolloExecutor};
use crate::config::{validate_config, GatewayConfig, ValidationError};
use crate::encoders;
use crate::http::{health_route, HttpServer, ServerError, ServerOptions, SessionSetup, WebsocketHandler};
use crate::identity::IdentifiableController;
use crate::lifecycle::faults::{self, Fault};
use crate::lifecycle::shutdown::{ShutdownCoordinator, ShutdownState, Shutdownable};
use crate::lifecycle::signals::termination_signals;
use crate::netpoll::Poller;
use crate::node::{Controller, DisconnectQueue, Disconnector, Executor, Node, NodeError, NoopDisconnector};
use crate::observability::logging::{init_logger, LoggingError};
use crate::observability::metrics::{Metrics, MetricsError};
use crate::pubsub::{Handler, Subscriber};
use crate::routing::{RouteError, RouterController};
use crate::rpc::RpcDial;
use crate::wspc;
use crate::BoxError;

const DEFAULT_NAME: &str = "CableGateway";

type ControllerFactory =
    Box<dyn FnOnce(&Arc<Metrics>, &GatewayConfig) -> Result<Arc<dyn Controller>, BoxError> + Send>;
type DisconnectorFactory =
    Box<dyn FnOnce(&Arc<Node>, &GatewayConfig) -> Result<Arc<dyn Disconnector>, BoxError> + Send>;
type SubscriberFactory =
    Box<dyn FnOnce(Arc<dyn Handler>, &GatewayConfig) -> Result<Arc<dyn Subscriber>, BoxError> + Send>;
type WebsocketHandlerFactory =
    Box<dyn FnOnce(&Arc<Node>, &GatewayConfig) -> Result<MethodRouter, BoxError> + Send>;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0} factory is not specified")]
    MissingFactory(&'static str),

    #[error("{0} factory is already set")]
    FactoryAlreadySet(&'static str),

    #[error("invalid configuration: {}", join(.0))]
    Config(Vec<ValidationError>),

    #[error("failed to initialize logger: {0}")]
    Logger(#[source] LoggingError),

    #[error("failed to initialize metrics writer: {0}")]
    Metrics(#[from] MetricsError),

    #[error("failed to initialize WS RPC server: {0}")]
    WsRpc(#[source] ServerError),

    #[error("failed to initialize controller: {0}")]
    Controller(#[source] BoxError),

    #[error("failed to build channels router: {0}")]
    Route(#[from] RouteError),

    #[error("failed to initialize application: {0}")]
    Node(#[from] NodeError),

    #[error("failed to initialize disconnector: {0}")]
    Disconnector(#[source] BoxError),

    #[error("couldn't configure pub/sub: {0}")]
    Subscriber(#[source] BoxError),

    #[error("failed to initialize WebSocket server at port {port}: {source}")]
    Server {
        port: u16,
        #[source]
        source: ServerError,
    },

    #[error("failed to initialize WebSocket handler: {0}")]
    WebsocketHandler(#[source] BoxError),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error(transparent)]
    Fault(#[from] Fault),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn fill<T>(slot: &mut Option<T>, value: T, name: &'static str) -> Result<(), RunnerError> {
    if slot.is_some() {
        return Err(RunnerError::FactoryAlreadySet(name));
    }
    *slot = Some(value);
    Ok(())
}

/// Registers a subscriber with the shutdown coordinator.
struct SubscriberShutdown(Arc<dyn Subscriber>);

#[async_trait]
impl Shutdownable for SubscriberShutdown {
    fn name(&self) -> &str {
        "subscriber"
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        self.0.shutdown().await
    }
}

/// Assembles the gateway from factories and runs it until termination.
pub struct Runner {
    name: String,
    config: GatewayConfig,
    controller_factory: Option<ControllerFactory>,
    disconnector_factory: Option<DisconnectorFactory>,
    subscriber_factory: Option<SubscriberFactory>,
    websocket_handler_factory: Option<WebsocketHandlerFactory>,
    shutdownables: Vec<Arc<dyn Shutdownable>>,
    router: Option<RouterController>,
    triggers: Option<mpsc::UnboundedReceiver<()>>,
    state: watch::Sender<ShutdownState>,
}

impl Runner {
    /// Create a runner. An empty name falls back to the default.
    pub fn new(name: impl Into<String>, config: GatewayConfig) -> Self {
        let name = name.into();
        Self {
            name: if name.is_empty() {
                DEFAULT_NAME.to_string()
            } else {
                name
            },
            config,
            controller_factory: None,
            disconnector_factory: None,
            subscriber_factory: None,
            websocket_handler_factory: None,
            shutdownables: Vec::new(),
            router: None,
            triggers: None,
            state: watch::channel(ShutdownState::Running).0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn controller_factory<F>(&mut self, factory: F) -> Result<&mut Self, RunnerError>
    where
        F: FnOnce(&Arc<Metrics>, &GatewayConfig) -> Result<Arc<dyn Controller>, BoxError>
            + Send
            + 'static,
    {
        let factory: ControllerFactory = Box::new(factory);
        fill(&mut self.controller_factory, factory, "controller")?;
        Ok(self)
    }

    pub fn disconnector_factory<F>(&mut self, factory: F) -> Result<&mut Self, RunnerError>
    where
        F: FnOnce(&Arc<Node>, &GatewayConfig) -> Result<Arc<dyn Disconnector>, BoxError>
            + Send
            + 'static,
    {
        let factory: DisconnectorFactory = Box::new(factory);
        fill(&mut self.disconnector_factory, factory, "disconnector")?;
        Ok(self)
    }

    pub fn subscriber_factory<F>(&mut self, factory: F) -> Result<&mut Self, RunnerError>
    where
        F: FnOnce(Arc<dyn Handler>, &GatewayConfig) -> Result<Arc<dyn Subscriber>, BoxError>
            + Send
            + 'static,
    {
        let factory: SubscriberFactory = Box::new(factory);
        fill(&mut self.subscriber_factory, factory, "subscriber")?;
        Ok(self)
    }

    pub fn websocket_handler_factory<F>(&mut self, factory: F) -> Result<&mut Self, RunnerError>
    where
        F: FnOnce(&Arc<Node>, &GatewayConfig) -> Result<MethodRouter, BoxError> + Send + 'static,
    {
        let factory: WebsocketHandlerFactory = Box::new(factory);
        fill(&mut self.websocket_handler_factory, factory, "websocket handler")?;
        Ok(self)
    }

    /// Channel router, built from the configured stream routes on first use.
    pub fn router(&mut self) -> Result<&mut RouterController, RunnerError> {
        let router = match self.router.take() {
            Some(router) => router,
            None => RouterController::from_config(&self.config.streams)?,
        };
        Ok(self.router.insert(router))
    }

    pub fn set_router(&mut self, router: RouterController) {
        self.router = Some(router);
    }

    /// Replace the OS signal source with an injected trigger stream.
    pub fn set_termination_source(&mut self, triggers: mpsc::UnboundedReceiver<()>) {
        self.triggers = Some(triggers);
    }

    /// Observe shutdown state transitions.
    pub fn shutdown_state(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Start every subsystem and block until the run ends.
    ///
    /// Returns `Ok(())` after an intentional shutdown and the first
    /// subsystem fault otherwise.
    pub async fn run(mut self) -> Result<(), RunnerError> {
        let controller_factory = self
            .controller_factory
            .take()
            .ok_or(RunnerError::MissingFactory("controller"))?;
        let subscriber_factory = self
            .subscriber_factory
            .take()
            .ok_or(RunnerError::MissingFactory("subscriber"))?;

        validate_config(&self.config).map_err(RunnerError::Config)?;

        init_logger(&self.config.logging.format, &self.config.logging.level)
            .map_err(RunnerError::Logger)?;

        let poller = Poller::from_config(&self.config.app);

        tracing::info!(
            pid = std::process::id(),
            netpoll = poller.is_some(),
            "Starting {} {}",
            self.name,
            env!("CARGO_PKG_VERSION")
        );

        let metrics = Arc::new(Metrics::from_config(&self.config.metrics)?);
        self.shutdownables.push(metrics.clone());

        let (reporter, aggregator) = faults::channel();
        let options = ServerOptions::from_config(&self.config.server);

        if self.config.ws_rpc.enabled() {
            let server = Arc::new(
                wspc::Server::new(&self.config.ws_rpc, &options)
                    .map_err(RunnerError::WsRpc)?,
            );
            self.config.rpc.dial = RpcDial::InProcess {
                service: server.clone(),
                handler: server.clone(),
            };
            reporter.spawn("ws rpc server", async move { server.start().await });
        }

        let mut controller =
            controller_factory(&metrics, &self.config).map_err(RunnerError::Controller)?;

        if self.config.jwt.enabled() {
            controller = Arc::new(IdentifiableController::new(controller, &self.config.jwt));

            // The token may also arrive as an `x-<param>` request header.
            let header = format!("x-{}", self.config.jwt.param.to_ascii_lowercase());
            if !self
                .config
                .headers
                .iter()
                .any(|h| h.eq_ignore_ascii_case(&header))
            {
                self.config.headers.push(header);
            }
            tracing::info!(
                param = %self.config.jwt.param,
                enforced = self.config.jwt.force,
                "Token identification is enabled"
            );
        }

        let mut router = match self.router.take() {
            Some(router) => router,
            None => RouterController::from_config(&self.config.streams)?,
        };
        if !router.is_empty() {
            router.set_default(controller);
            tracing::info!("Using channels router: {}", router.routes().join(", "));
            controller = Arc::new(router);
        }

        let node = Arc::new(Node::new(
            controller.clone(),
            metrics.clone(),
            &self.config.app,
        ));
        node.start()?;

        let disconnector = match self.disconnector_factory.take() {
            Some(factory) => factory(&node, &self.config).map_err(RunnerError::Disconnector)?,
            None => default_disconnector(&node, &self.config),
        };
        let running = disconnector.clone();
        reporter.spawn("disconnector", async move { running.run().await });
        node.set_disconnector(disconnector);

        let handler: Arc<dyn Handler> = node.clone();
        let subscriber =
            subscriber_factory(handler, &self.config).map_err(RunnerError::Subscriber)?;
        self.shutdownables
            .push(Arc::new(SubscriberShutdown(subscriber.clone())));
        reporter.spawn("subscriber", async move { subscriber.start().await });

        let running = controller.clone();
        reporter.spawn("controller", async move { running.start().await });

        let port = self.config.server.port;
        let server = Arc::new(
            HttpServer::for_port(port, &options)
                .map_err(|source| RunnerError::Server { port, source })?,
        );
        self.shutdownables.push(server.clone());

        let websocket = match self.websocket_handler_factory.take() {
            Some(factory) => factory(&node, &self.config).map_err(RunnerError::WebsocketHandler)?,
            None => default_websocket_handler(&node, &self.config, &options, poller.clone()),
        };
        server.handle(&self.config.server.path, websocket);
        tracing::info!(
            "Handle WebSocket connections at {}{}",
            server.address(),
            self.config.server.path
        );

        if self.config.apollo.enabled() {
            let handler = apollo_websocket_handler(&node, &self.config, &options, poller.clone());
            server.handle(&self.config.apollo.path, handler);
            tracing::info!(
                "Handle Apollo GraphQL WebSocket connections at {}{}",
                server.address(),
                self.config.apollo.path
            );
        }

        server.handle(&self.config.server.health_path, health_route());
        tracing::info!(
            "Handle health connections at {}{}",
            server.address(),
            self.config.server.health_path
        );

        if let Some(path) = self.config.metrics.exporter_path() {
            let exporter = metrics.clone();
            server.handle(
                path,
                get(move || {
                    let exporter = exporter.clone();
                    async move { exporter.render_prometheus().unwrap_or_default() }
                }),
            );
            tracing::info!("Serve metrics at {}{}", server.address(), path);
        }

        let acceptor = server.clone();
        reporter.spawn("websocket server", async move {
            match acceptor.start_and_announce("WebSocket server").await {
                Err(_) if acceptor.stopped() => Ok(()),
                result => result,
            }
        });

        let running = metrics.clone();
        reporter.spawn("metrics", async move { running.run().await });

        self.shutdownables.push(node.clone());

        announce_pools(&node, poller.as_deref());

        let triggers = match self.triggers.take() {
            Some(triggers) => triggers,
            None => termination_signals().map_err(RunnerError::Signals)?,
        };
        let coordinator = ShutdownCoordinator::new(self.shutdownables, self.state);
        tokio::spawn(coordinator.run(triggers, reporter));

        aggregator.wait().await?;
        tracing::info!("{} stopped", self.name);
        Ok(())
    }
}

fn default_disconnector(node: &Arc<Node>, config: &GatewayConfig) -> Arc<dyn Disconnector> {
    if config.disconnect_queue.disabled {
        Arc::new(NoopDisconnector::new())
    } else {
        Arc::new(DisconnectQueue::new(node, &config.disconnect_queue))
    }
}

/// Action Cable endpoint: encoder by subprotocol, authenticated on upgrade.
fn default_websocket_handler(
    node: &Arc<Node>,
    config: &GatewayConfig,
    options: &ServerOptions,
    poller: Option<Arc<Poller>>,
) -> MethodRouter {
    let executor: Arc<dyn Executor> = node.clone();

    WebsocketHandler::new(node.clone(), options, &config.headers, move |protocol| {
        SessionSetup {
            encoder: encoders::for_protocol(protocol),
            executor: executor.clone(),
            authenticate: true,
        }
    })
    .with_protocols(&encoders::PROTOCOLS)
    .with_poller(poller)
    .into_route()
}

/// GraphQL endpoint: authentication waits for `connection_init`.
fn apollo_websocket_handler(
    node: &Arc<Node>,
    config: &GatewayConfig,
    options: &ServerOptions,
    poller: Option<Arc<Poller>>,
) -> MethodRouter {
    let executor: Arc<dyn Executor> = Arc::new(ApolloExecutor::new(node.clone(), &config.apollo));

    WebsocketHandler::new(node.clone(), options, &config.headers, move |_| SessionSetup {
        encoder: Arc::new(ApolloEncoder),
        executor: executor.clone(),
        authenticate: false,
    })
    .with_protocols(&[apollo::PROTOCOL])
    .with_poller(poller)
    .into_route()
}

fn announce_pools(node: &Node, poller: Option<&Poller>) {
    let pools = node
        .pools()
        .into_iter()
        .chain(poller.map(Poller::pool))
        .map(|pool| format!("{}: {}", pool.name(), pool.size()))
        .collect::<Vec<_>>();

    tracing::debug!("Worker pools initialized ({})", pools.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_factories(runner: &mut Runner) {
        runner
            .controller_factory(|_, _| Err("unused".into()))
            .unwrap()
            .subscriber_factory(|_, _| Err("unused".into()))
            .unwrap();
    }

    #[test]
    fn empty_name_uses_default() {
        assert_eq!(Runner::new("", GatewayConfig::default()).name(), DEFAULT_NAME);
        assert_eq!(Runner::new("edge", GatewayConfig::default()).name(), "edge");
    }

    #[test]
    fn factories_can_be_set_once() {
        let mut runner = Runner::new("", GatewayConfig::default());
        noop_factories(&mut runner);

        let err = runner
            .controller_factory(|_, _| Err("again".into()))
            .err()
            .unwrap();
        assert!(matches!(err, RunnerError::FactoryAlreadySet("controller")));
    }

    #[tokio::test]
    async fn missing_controller_is_reported_first() {
        let runner = Runner::new("", GatewayConfig::default());
        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, RunnerError::MissingFactory("controller")));
    }

    #[tokio::test]
    async fn invalid_config_fails_before_startup() {
        let mut config = GatewayConfig::default();
        config.server.path = "cable".into();

        let mut runner = Runner::new("", config);
        noop_factories(&mut runner);

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, RunnerError::Config(ref errors) if errors.len() == 1));
        assert!(err.to_string().starts_with("invalid configuration: "));
    }

    #[test]
    fn router_is_built_from_stream_routes() {
        let mut config = GatewayConfig::default();
        config.streams.push(crate::config::StreamRouteConfig {
            channel: "Turbo::StreamsChannel".into(),
            secret: "s3cr3t".into(),
        });

        let mut runner = Runner::new("", config);
        assert_eq!(runner.router().unwrap().routes(), vec!["Turbo::StreamsChannel"]);
        assert!(!runner.router().unwrap().is_empty());
    }
}
