//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum_server acceptor, route table, shutdown handle)
//!     → websocket.rs (upgrade, subprotocol negotiation, session pump)
//!     → node (authenticate, commands, broadcasts)
//!
//! health.rs answers liveness probes on the same acceptor.
//! ```

pub mod health;
pub mod server;
pub mod websocket;

pub use health::health_route;
pub use server::{HttpServer, ServerError, ServerOptions};
pub use websocket::{SessionSetup, WebsocketHandler};
