//! Connection tracking and limits.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live websocket connections per handler
//! - Refuse new connections once the configured limit is reached

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Process-wide connection number, shown as `conn-<n>` in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts live connections against an optional limit.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    /// Maximum live connections (0 = unlimited).
    limit: usize,
}

impl ConnectionTracker {
    pub fn new(limit: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    /// Claim a connection slot, `None` when the limit is reached.
    pub fn try_track(&self) -> Option<ConnectionGuard> {
        let claimed = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (self.limit == 0 || current < self.limit).then_some(current + 1)
            });

        claimed.ok().map(|_| ConnectionGuard {
            active: Arc::clone(&self.active),
            id: ConnectionId::next(),
        })
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Live connection slot, released on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<AtomicUsize>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_get_distinct_ids() {
        let tracker = ConnectionTracker::new(0);
        let a = tracker.try_track().unwrap();
        let b = tracker.try_track().unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.id().to_string().starts_with("conn-"));
    }

    #[test]
    fn enforces_limit() {
        let tracker = ConnectionTracker::new(2);

        let first = tracker.try_track().unwrap();
        let _second = tracker.try_track().unwrap();
        assert!(tracker.try_track().is_none());
        assert_eq!(tracker.active_count(), 2);

        drop(first);
        assert!(tracker.try_track().is_some());
    }

    #[test]
    fn zero_means_unlimited() {
        let tracker = ConnectionTracker::new(0);
        let guards: Vec<_> = (0..100).filter_map(|_| tracker.try_track()).collect();
        assert_eq!(guards.len(), 100);
    }
}
