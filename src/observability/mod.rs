//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout (text or JSON lines)
//!     → periodic metrics snapshot in the log
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Logging is initialized first; nothing else can report errors without it
//! - Metrics are cheap (atomic increments) and mirrored to the `metrics` facade

pub mod logging;
pub mod metrics;
