//! Real-time websocket gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────────┐
//!                     │                      CABLE GATEWAY                        │
//!                     │                                                           │
//!   WebSocket client  │  ┌─────────┐   ┌──────────┐   ┌──────┐   ┌────────────┐   │
//!   ──────────────────┼─▶│  http   │──▶│ encoders │──▶│ node │──▶│ controller │───┼──▶ RPC backend
//!                     │  │websocket│   └──────────┘   │ hub  │   │ (identity, │   │    (HTTP or
//!                     │  └─────────┘                  └──┬───┘   │  routing)  │   │    in-process)
//!                     │                                  ▲       └────────────┘   │
//!   Broadcasts        │  ┌─────────┐                     │                        │
//!   ──────────────────┼─▶│ pubsub  │─────────────────────┘                        │
//!                     │  └─────────┘                                              │
//!                     │                                                           │
//!                     │  ┌─────────────────────────────────────────────────────┐  │
//!                     │  │                    lifecycle                         │  │
//!                     │  │  startup sequencer → faults ← shutdown coordinator   │  │
//!                     │  └─────────────────────────────────────────────────────┘  │
//!                     └──────────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod node;
pub mod routing;

// Protocol plumbing
pub mod apollo;
pub mod encoders;
pub mod identity;
pub mod pubsub;
pub mod rpc;
pub mod wspc;

// Execution
pub mod netpoll;
pub mod pool;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

/// Error type used at the collaborator seams (factories, controllers, subscribers).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::schema::GatewayConfig;
pub use lifecycle::{Runner, RunnerError, Shutdownable};
