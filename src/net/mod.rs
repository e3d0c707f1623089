//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! host:port
//!     → listener.rs (resolve, bind, hand the socket to the HTTP server)
//!     → tls.rs (optional certificate loading, shared by every acceptor)
//!     → connection.rs (per-handler connection limits and tracking)
//! ```
//!
//! # Design Decisions
//! - Sockets are bound eagerly so the real address is known before serving
//! - Connection limits are enforced per websocket handler, not per socket
//! - TLS is optional and handled transparently by the acceptor

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{bind, ListenerError};
pub use tls::load_tls_config;
