//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::rpc::RpcDial;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Primary websocket acceptor.
    pub server: ServerConfig,

    /// Logger settings.
    pub logging: LoggingConfig,

    /// Metrics reporter settings.
    pub metrics: MetricsConfig,

    /// Application node settings.
    pub app: AppConfig,

    /// Outbound RPC settings used by the stock controller.
    pub rpc: RpcConfig,

    /// Secondary in-process RPC acceptor.
    pub ws_rpc: WsRpcConfig,

    /// Disconnect notifications queue.
    pub disconnect_queue: DisconnectQueueConfig,

    /// Token-based identification.
    pub jwt: JwtConfig,

    /// Signed stream routes served without calling the RPC backend.
    pub streams: Vec<StreamRouteConfig>,

    /// GraphQL-over-websocket front-end.
    pub apollo: ApolloConfig,

    /// HTTP broadcast endpoint used by the stock subscriber.
    pub broadcast: BroadcastConfig,

    /// Request headers passed through to the controller.
    pub headers: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            app: AppConfig::default(),
            rpc: RpcConfig::default(),
            ws_rpc: WsRpcConfig::default(),
            disconnect_queue: DisconnectQueueConfig::default(),
            jwt: JwtConfig::default(),
            streams: Vec::new(),
            apollo: ApolloConfig::default(),
            broadcast: BroadcastConfig::default(),
            headers: vec!["cookie".to_string()],
        }
    }
}

/// Primary HTTP/websocket server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to (0 picks an ephemeral port).
    pub port: u16,

    /// Websocket endpoint path.
    pub path: String,

    /// Liveness endpoint path.
    pub health_path: String,

    /// Maximum concurrent websocket connections per handler (0 = unlimited).
    pub max_conn: usize,

    /// Optional TLS configuration shared by every acceptor.
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            path: "/cable".to_string(),
            health_path: "/health".to_string(),
            max_conn: 0,
            tls: None,
        }
    }
}

/// TLS configuration for the acceptors.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Output format: `text` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Metrics reporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Interval between metrics log snapshots in seconds (0 disables).
    pub log_interval_secs: u64,

    /// Install the Prometheus recorder.
    pub prometheus: bool,

    /// Path on the primary server exposing Prometheus metrics.
    pub http_path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            log_interval_secs: 0,
            prometheus: false,
            http_path: "/metrics".to_string(),
        }
    }
}

impl MetricsConfig {
    /// Path to mount the Prometheus endpoint at, if any.
    pub fn exporter_path(&self) -> Option<&str> {
        if self.prometheus && !self.http_path.is_empty() {
            Some(&self.http_path)
        } else {
            None
        }
    }
}

/// Application node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Interval between pings sent to every session, in seconds.
    pub ping_interval_secs: u64,

    /// Maximum concurrent controller calls.
    pub rpc_concurrency: usize,

    /// Gate inbound frame handling through the shared poller.
    pub netpoll_enabled: bool,

    /// Poller worker count.
    pub netpoll_workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 3,
            rpc_concurrency: 28,
            netpoll_enabled: false,
            netpoll_workers: 128,
        }
    }
}

/// Outbound RPC configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Base URL of the HTTP RPC backend.
    pub url: String,

    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Maximum attempts per call (1 disables retries).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// How the controller reaches the RPC implementation.
    /// Rewired at startup when the in-process acceptor is enabled.
    #[serde(skip)]
    pub dial: RpcDial,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000/_anycable".to_string(),
            request_timeout_ms: 3000,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            dial: RpcDial::default(),
        }
    }
}

/// Secondary RPC acceptor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WsRpcConfig {
    /// Endpoint path; empty disables the acceptor.
    pub path: String,

    /// Endpoint port.
    pub port: u16,
}

impl Default for WsRpcConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            port: 8091,
        }
    }
}

impl WsRpcConfig {
    pub fn enabled(&self) -> bool {
        !self.path.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisconnectQueueConfig {
    /// Skip disconnect notifications entirely.
    pub disabled: bool,

    /// Maximum disconnect calls per second.
    pub rate: u32,

    /// Time allowed to drain pending notifications on shutdown, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for DisconnectQueueConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            rate: 100,
            shutdown_timeout_secs: 5,
        }
    }
}

/// Token identification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Signing secret; empty disables identification.
    pub secret: String,

    /// Query parameter (or `x-<param>` header) carrying the token.
    pub param: String,

    /// Reject connections without a token.
    pub force: bool,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            param: "jid".to_string(),
            force: false,
        }
    }
}

impl JwtConfig {
    pub fn enabled(&self) -> bool {
        !self.secret.is_empty()
    }
}

/// Channel served by a signed stream controller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamRouteConfig {
    /// Channel name matched exactly against the subscription identifier.
    pub channel: String,

    /// Secret used to verify signed stream names.
    pub secret: String,
}

/// GraphQL front-end configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApolloConfig {
    /// Endpoint path; empty disables the front-end.
    pub path: String,

    /// Channel that GraphQL subscriptions are mapped onto.
    pub channel: String,

    /// Channel action executing a subscription query.
    pub action: String,
}

impl Default for ApolloConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            channel: "GraphqlChannel".to_string(),
            action: "execute".to_string(),
        }
    }
}

impl ApolloConfig {
    pub fn enabled(&self) -> bool {
        !self.path.is_empty()
    }
}

/// HTTP broadcast endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub port: u16,
    pub path: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            path: "/_broadcast".to_string(),
        }
    }
}
