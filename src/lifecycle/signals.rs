//! OS signal handling.
//!
//! # Responsibilities
//! - Register SIGTERM and SIGINT handlers
//! - Forward every occurrence as a shutdown trigger
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Counting triggers is left to the shutdown coordinator

use std::io;

use tokio::sync::mpsc;

/// Install termination handlers and return the trigger stream.
///
/// Each SIGINT or SIGTERM delivers one `()`. Must be called inside a runtime.
#[cfg(unix)]
pub fn termination_signals() -> io::Result<mpsc::UnboundedReceiver<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = interrupt.recv() => "SIGINT",
                Some(()) = terminate.recv() => "SIGTERM",
                else => break,
            };
            tracing::debug!(signal = name, "Received termination signal");
            if tx.send(()).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(not(unix))]
pub fn termination_signals() -> io::Result<mpsc::UnboundedReceiver<()>> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!(signal = "ctrl-c", "Received termination signal");
            if tx.send(()).is_err() {
                break;
            }
        }
    });

    Ok(rx)
}
