//! HTTP server setup.
//!
//! # Responsibilities
//! - Bind the listening socket eagerly (the address is known before serving)
//! - Collect routes mounted by the runner or a subsystem
//! - Serve plain HTTP or TLS with websocket upgrades
//! - Stop on demand and remember that the stop was intentional

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::MethodRouter;
use axum::Router;
use axum_server::Handle;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, TlsConfig};
use crate::lifecycle::Shutdownable;
use crate::net::{self, ListenerError};
use crate::BoxError;

/// Settings shared by every acceptor in the process.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    /// Maximum websocket connections per handler (0 = unlimited).
    pub max_conn: usize,
    pub tls: Option<TlsConfig>,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            max_conn: config.max_conn,
            tls: config.tls.clone(),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to load TLS configuration: {0}")]
    Tls(#[source] std::io::Error),

    #[error("server at {address} stopped: {source}")]
    Serve {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server at {0} is already started")]
    AlreadyStarted(String),
}

pub struct HttpServer {
    host: String,
    local_addr: SocketAddr,
    listener: Mutex<Option<std::net::TcpListener>>,
    router: Mutex<Option<Router>>,
    tls: Option<TlsConfig>,
    handle: Handle,
    stopped: AtomicBool,
}

impl HttpServer {
    /// Bind a server on `port` using the shared options.
    pub fn for_port(port: u16, options: &ServerOptions) -> Result<Self, ServerError> {
        let listener = net::bind(&options.host, port)?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ListenerError::Bind(SocketAddr::from(([0, 0, 0, 0], port)), e))?;

        Ok(Self {
            host: options.host.clone(),
            local_addr,
            listener: Mutex::new(Some(listener)),
            router: Mutex::new(Some(Router::new())),
            tls: options.tls.clone(),
            handle: Handle::new(),
            stopped: AtomicBool::new(false),
        })
    }

    /// Mount a route. Routes added after `start_and_announce` are ignored.
    pub fn handle(&self, path: &str, route: MethodRouter) {
        let mut router = self.router.lock().expect("router mutex poisoned");
        match router.take() {
            Some(current) => *router = Some(current.route(path, route)),
            None => tracing::warn!(path, "Route mounted after server start, ignoring"),
        }
    }

    /// Public base URL of the server.
    pub fn address(&self) -> String {
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.local_addr.port())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until shutdown or a transport failure.
    pub async fn start_and_announce(&self, name: &str) -> Result<(), ServerError> {
        if self.stopped() {
            return Ok(());
        }

        let taken = self.listener.lock().expect("listener mutex poisoned").take();
        let listener = match taken {
            Some(listener) => listener,
            // Released by a concurrent `shutdown`.
            None if self.stopped() => return Ok(()),
            None => return Err(ServerError::AlreadyStarted(self.address())),
        };

        let router = self
            .router
            .lock()
            .expect("router mutex poisoned")
            .take()
            .unwrap_or_default()
            .layer(TraceLayer::new_for_http());

        tracing::info!(address = %self.address(), "Starting {}", name);

        let served = match &self.tls {
            Some(tls) => {
                let rustls = net::load_tls_config(tls).await.map_err(ServerError::Tls)?;
                axum_server::from_tcp_rustls(listener, rustls)
                    .handle(self.handle.clone())
                    .serve(router.into_make_service())
                    .await
            }
            None => {
                axum_server::from_tcp(listener)
                    .handle(self.handle.clone())
                    .serve(router.into_make_service())
                    .await
            }
        };

        served.map_err(|source| ServerError::Serve {
            address: self.address(),
            source,
        })
    }

    /// Whether `shutdown` has been requested.
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop accepting connections and release the socket. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(self.listener.lock().expect("listener mutex poisoned").take());
        self.handle.graceful_shutdown(Some(Duration::from_secs(1)));
    }
}

#[async_trait]
impl Shutdownable for HttpServer {
    fn name(&self) -> &str {
        "http server"
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        HttpServer::shutdown(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::sync::Arc;

    fn options() -> ServerOptions {
        ServerOptions {
            host: "127.0.0.1".into(),
            max_conn: 0,
            tls: None,
        }
    }

    #[tokio::test]
    async fn serves_mounted_routes_until_shutdown() {
        let server = Arc::new(HttpServer::for_port(0, &options()).unwrap());
        server.handle("/ping", get(|| async { "pong" }));
        assert!(server.address().starts_with("http://127.0.0.1:"));

        let runner = server.clone();
        let handle = tokio::spawn(async move { runner.start_and_announce("test server").await });

        let url = format!("{}/ping", server.address());
        let mut body = None;
        for _ in 0..50 {
            if let Ok(response) = reqwest::get(&url).await {
                body = Some(response.text().await.unwrap());
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(body.as_deref(), Some("pong"));

        server.shutdown();
        server.shutdown();
        assert!(server.stopped());

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn shutdown_before_start_is_clean() {
        let server = HttpServer::for_port(0, &options()).unwrap();
        server.shutdown();
        assert!(server.start_and_announce("test server").await.is_ok());
    }

    #[tokio::test]
    async fn shutdown_before_start_releases_the_port() {
        let server = HttpServer::for_port(0, &options()).unwrap();
        let port = server.local_addr().port();

        server.shutdown();
        let rebound = std::net::TcpListener::bind(("127.0.0.1", port));
        assert!(rebound.is_ok(), "port {} is still held", port);
    }

    #[tokio::test]
    async fn cannot_start_twice() {
        let server = HttpServer::for_port(0, &options()).unwrap();
        let served = Arc::new(server);
        let runner = served.clone();
        let handle = tokio::spawn(async move { runner.start_and_announce("test server").await });

        let url = format!("{}/", served.address());
        for _ in 0..50 {
            if reqwest::get(&url).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let err = served.start_and_announce("test server").await.unwrap_err();
        assert!(matches!(err, ServerError::AlreadyStarted(_)));

        served.shutdown();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}
