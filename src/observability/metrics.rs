//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count gateway events (clients, broadcasts, RPC calls, auth failures)
//! - Periodically write a snapshot to the log
//! - Expose Prometheus-compatible metrics when enabled
//!
//! # Metrics
//! - `clients_num` (gauge): connected sessions
//! - `client_msg_total` (counter): inbound client commands
//! - `broadcast_msg_total` (counter): broadcasts received from pub/sub
//! - `failed_auths_total` (counter): rejected connections
//! - `rpc_call_total` / `rpc_error_total` (counters): controller calls
//! - `disconnect_queue_size` (gauge): pending disconnect notifications
//!
//! # Design Decisions
//! - Local atomics are the source of truth for the log snapshot
//! - Every update is mirrored to the `metrics` facade (no-op without a recorder)

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tokio::sync::watch;

use crate::config::MetricsConfig;
use crate::lifecycle::Shutdownable;
use crate::BoxError;

pub const CLIENTS_NUM: &str = "clients_num";
pub const CLIENT_MSG: &str = "client_msg_total";
pub const BROADCAST_MSG: &str = "broadcast_msg_total";
pub const FAILED_AUTHS: &str = "failed_auths_total";
pub const RPC_CALLS: &str = "rpc_call_total";
pub const RPC_ERRORS: &str = "rpc_error_total";
pub const DISCONNECT_QUEUE_SIZE: &str = "disconnect_queue_size";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to install Prometheus recorder: {0}")]
    Prometheus(#[from] BuildError),
}

/// Metrics reporter shared by every subsystem.
pub struct Metrics {
    counters: DashMap<&'static str, AtomicU64>,
    gauges: DashMap<&'static str, AtomicU64>,
    log_interval: Option<Duration>,
    prometheus: Option<PrometheusHandle>,
    closing: watch::Sender<bool>,
}

impl Metrics {
    /// Build the reporter, installing the Prometheus recorder when configured.
    pub fn from_config(config: &MetricsConfig) -> Result<Self, MetricsError> {
        let prometheus = if config.prometheus {
            Some(PrometheusBuilder::new().install_recorder()?)
        } else {
            None
        };

        Ok(Self {
            counters: DashMap::new(),
            gauges: DashMap::new(),
            log_interval: (config.log_interval_secs > 0)
                .then(|| Duration::from_secs(config.log_interval_secs)),
            prometheus,
            closing: watch::channel(false).0,
        })
    }

    pub fn counter_increment(&self, name: &'static str) {
        self.counter_add(name, 1);
    }

    pub fn counter_add(&self, name: &'static str, value: u64) {
        self.counters
            .entry(name)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
        ::metrics::counter!(name).increment(value);
    }

    pub fn gauge_set(&self, name: &'static str, value: u64) {
        self.gauges
            .entry(name)
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
        ::metrics::gauge!(name).set(value as f64);
    }

    /// Current value of a counter or gauge (0 if never touched).
    pub fn value(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .or_else(|| self.gauges.get(name))
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All counters and gauges, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.counters
            .iter()
            .chain(self.gauges.iter())
            .map(|entry| (*entry.key(), entry.value().load(Ordering::Relaxed)))
            .collect()
    }

    /// Prometheus text exposition, when the recorder is installed.
    pub fn render_prometheus(&self) -> Option<String> {
        self.prometheus.as_ref().map(PrometheusHandle::render)
    }

    /// Run the reporter until shutdown.
    pub async fn run(&self) -> Result<(), MetricsError> {
        let mut closing = self.closing.subscribe();

        let Some(period) = self.log_interval else {
            let _ = closing.wait_for(|closed| *closed).await;
            return Ok(());
        };

        tracing::info!(interval_secs = period.as_secs(), "Log metrics every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.log_snapshot(),
                _ = async { let _ = closing.wait_for(|closed| *closed).await; } => break,
            }
        }

        Ok(())
    }

    /// Stop the run loop, flushing a final snapshot.
    pub fn shutdown(&self) {
        if self.closing.send_replace(true) {
            return;
        }
        if self.log_interval.is_some() {
            self.log_snapshot();
        }
    }

    fn log_snapshot(&self) {
        let line = self
            .snapshot()
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(target: "metrics", "{}", line);
    }
}

#[async_trait]
impl Shutdownable for Metrics {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn shutdown(&self) -> Result<(), BoxError> {
        Metrics::shutdown(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn metrics() -> Metrics {
        Metrics::from_config(&MetricsConfig::default()).unwrap()
    }

    #[test]
    fn counts_and_snapshots() {
        let m = metrics();
        m.counter_increment(BROADCAST_MSG);
        m.counter_add(BROADCAST_MSG, 2);
        m.gauge_set(CLIENTS_NUM, 5);
        m.gauge_set(CLIENTS_NUM, 4);

        assert_eq!(m.value(BROADCAST_MSG), 3);
        assert_eq!(m.value(CLIENTS_NUM), 4);
        assert_eq!(m.value(RPC_ERRORS), 0);

        let snapshot = m.snapshot();
        assert_eq!(snapshot.get(BROADCAST_MSG), Some(&3));
        assert!(m.render_prometheus().is_none());
    }

    #[tokio::test]
    async fn run_returns_after_shutdown() {
        let m = Arc::new(metrics());
        let runner = m.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tokio::task::yield_now().await;
        m.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("run loop did not stop");
        assert!(result.unwrap().is_ok());
    }

    #[tokio::test]
    async fn interval_loop_stops_on_shutdown() {
        let m = Arc::new(
            Metrics::from_config(&MetricsConfig {
                log_interval_secs: 1,
                ..MetricsConfig::default()
            })
            .unwrap(),
        );
        m.shutdown();
        // Shutdown before run: the loop must not block.
        tokio::time::timeout(Duration::from_secs(1), m.run())
            .await
            .expect("run loop did not stop")
            .unwrap();
    }
}
