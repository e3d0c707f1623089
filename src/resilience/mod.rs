//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound RPC call:
//!     → retries.rs (classify failure, decide whether to try again)
//!     → backoff.rs (exponential delay with jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline (enforced by the HTTP client)
//! - Only transport errors and 5xx responses are retried
//! - Jittered backoff prevents thundering herd after a backend restart

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{retry, Retryable};
