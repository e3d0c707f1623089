//! Fault aggregation.
//!
//! Every background task shares one [`FaultReporter`]; the runner owns the
//! single [`FaultAggregator`]. The first outcome reported wins, every later
//! report is dropped without blocking its producer.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Terminal failure of a background subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{subsystem} failed: {message}")]
pub struct Fault {
    pub subsystem: String,
    pub message: String,
}

impl Fault {
    pub fn new(subsystem: impl Into<String>, message: impl Display) -> Self {
        Self {
            subsystem: subsystem.into(),
            message: message.to_string(),
        }
    }
}

/// Outcome of a whole run: `Ok(())` is an intentional termination.
pub type Outcome = Result<(), Fault>;

/// Create a connected reporter/aggregator pair.
pub fn channel() -> (FaultReporter, FaultAggregator) {
    let (tx, rx) = oneshot::channel();
    (
        FaultReporter {
            slot: Arc::new(Mutex::new(Some(tx))),
        },
        FaultAggregator { rx },
    )
}

/// Producer side, cheap to clone into every task.
#[derive(Debug, Clone)]
pub struct FaultReporter {
    slot: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl FaultReporter {
    /// Report an outcome. Returns `true` if this was the first report.
    pub fn report(&self, outcome: Outcome) -> bool {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Report a failure tagged with the originating subsystem.
    pub fn fail(&self, subsystem: &str, error: impl Display) -> bool {
        let fault = Fault::new(subsystem, error);
        let message = fault.message.clone();

        if self.report(Err(fault)) {
            tracing::error!(subsystem = %subsystem, error = %message, "Subsystem failed");
            true
        } else {
            tracing::debug!(
                subsystem = %subsystem,
                error = %message,
                "Subsystem failed after the run ended"
            );
            false
        }
    }

    /// Report an intentional termination.
    pub fn clean(&self) -> bool {
        self.report(Ok(()))
    }

    /// Whether an outcome has already been reported.
    pub fn is_settled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// Run a subsystem loop on its own task; an error or a panic ends the run.
    pub fn spawn<F, E>(&self, subsystem: &'static str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let reporter = self.clone();
        let task = tokio::spawn(task);
        tokio::spawn(async move {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    reporter.fail(subsystem, e);
                }
                Err(e) if e.is_panic() => {
                    let reason = panic_reason(e.into_panic());
                    reporter.fail(subsystem, format!("panicked: {}", reason));
                }
                Err(_) => {
                    reporter.fail(subsystem, "task was cancelled");
                }
            }
        })
    }
}

fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => message.to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

/// Consumer side. Consumed by the single read.
#[derive(Debug)]
pub struct FaultAggregator {
    rx: oneshot::Receiver<Outcome>,
}

impl FaultAggregator {
    /// Wait for the first reported outcome.
    pub async fn wait(self) -> Outcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Fault::new("runner", "every fault reporter was dropped")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn first_report_wins() {
        let (reporter, aggregator) = channel();

        assert!(reporter.fail("subscriber", "connection lost"));
        assert!(!reporter.clean());
        assert!(reporter.is_settled());

        let outcome = aggregator.wait().await;
        assert_eq!(outcome, Err(Fault::new("subscriber", "connection lost")));
    }

    #[tokio::test]
    async fn concurrent_reports_observe_exactly_one() {
        let (reporter, aggregator) = channel();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let reporter = reporter.clone();
                tokio::spawn(async move { reporter.fail("worker", format!("failure {}", i)) })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let fault = aggregator.wait().await.unwrap_err();
        assert_eq!(fault.subsystem, "worker");
    }

    #[tokio::test]
    async fn reports_after_consumption_never_block() {
        let (reporter, aggregator) = channel();
        reporter.clean();
        assert_eq!(aggregator.wait().await, Ok(()));

        let late = tokio::time::timeout(Duration::from_millis(100), async {
            reporter.fail("late", "ignored")
        })
        .await;
        assert_eq!(late, Ok(false));
    }

    #[tokio::test]
    async fn spawn_tags_failures() {
        let (reporter, aggregator) = channel();
        reporter.spawn("controller", async { Err::<(), _>("keepalive lost") });
        reporter.spawn("metrics", async { Ok::<(), String>(()) });

        let fault = aggregator.wait().await.unwrap_err();
        assert_eq!(fault.subsystem, "controller");
        assert_eq!(fault.to_string(), "controller failed: keepalive lost");
    }

    #[tokio::test]
    async fn panicking_task_is_reported() {
        let (reporter, aggregator) = channel();
        let _keepalive = reporter.clone();
        reporter.spawn("disconnector", async {
            if true {
                panic!("boom");
            }
            Ok::<(), String>(())
        });

        let outcome = tokio::time::timeout(Duration::from_secs(1), aggregator.wait())
            .await
            .expect("panic was not reported");
        let fault = outcome.unwrap_err();
        assert_eq!(fault.subsystem, "disconnector");
        assert_eq!(fault.message, "panicked: boom");
    }

    #[tokio::test]
    async fn losing_failures_are_dropped() {
        let (reporter, aggregator) = channel();
        assert!(reporter.clean());
        assert!(!reporter.fail("websocket server", "listener closed"));
        assert_eq!(aggregator.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn dropped_reporters_surface_as_fault() {
        let (reporter, aggregator) = channel();
        drop(reporter);
        assert!(aggregator.wait().await.is_err());
    }
}
