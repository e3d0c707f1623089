//! Application node subsystem.
//!
//! # Data Flow
//! ```text
//! websocket frame → Session → Executor (Node) → Controller → CommandResult
//!                                                              │
//!                      Hub (stream → sessions) ◀───────────────┘
//!                          │
//! pub/sub broadcast ───────┴──▶ Session::send → outbound queue → websocket
//! ```

pub mod app;
pub mod controller;
pub mod disconnector;
pub mod hub;
pub mod session;
pub mod types;

pub use app::{Node, NodeError};
pub use controller::Controller;
pub use disconnector::{DisconnectQueue, Disconnector, NoopDisconnector};
pub use session::{Executor, Outbound, Session, SessionError};
pub use types::{
    Command, CommandKind, CommandResult, ConnectResult, Reply, ReplyType, SessionEnv, Status,
    StreamMessage,
};
