//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Check factories → Validate config → Start subsystems in order → Wait
//!
//! Faults (faults.rs):
//!     Any subsystem error ─┐
//!     Shutdown complete ───┴─▶ single slot (first write wins) ─▶ Runner::run returns
//!
//! Shutdown (shutdown.rs):
//!     First signal → GracefulShutdown → stop every Shutdownable
//!     Second signal → ForcedShutdown → stop waiting
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown trigger
//! ```
//!
//! # Design Decisions
//! - Subsystems never abort the process; they report into the fault slot
//! - Shutdownables are stopped sequentially in registration order
//! - A second trigger abandons the graceful sweep

pub mod faults;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use faults::{Fault, FaultAggregator, FaultReporter, Outcome};
pub use shutdown::{ShutdownCoordinator, ShutdownState, Shutdownable};
pub use startup::{Runner, RunnerError};
