//! Channel routing subsystem.
//!
//! # Data Flow
//! ```text
//! Command (identifier = {"channel": "...", ...})
//!     → router.rs (exact channel lookup)
//!     → matched route controller (e.g. streams.rs signed streams)
//!     → or the default controller (RPC backend)
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Exact channel-name match only
//! - Authentication and disconnects always go to the default controller

pub mod router;
pub mod streams;

pub use router::{RouteError, RouterController};
pub use streams::SignedStreamController;
