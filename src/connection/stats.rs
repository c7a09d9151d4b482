//! Gateway connection statistics
//!
//! Counters are updated by connection tasks and read when the gateway stops.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::io::CopyResult;

/// Atomic connection statistics
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total connections accepted
    total_accepted: AtomicU64,
    /// Currently active connections
    active: AtomicU64,
    /// Connections that reached the relay and finished it
    completed: AtomicU64,
    /// Connections dropped before the relay
    errored: AtomicU64,
    /// Total bytes relayed client -> upstream
    bytes_up: AtomicU64,
    /// Total bytes relayed upstream -> client
    bytes_down: AtomicU64,
}

impl ConnectionStats {
    /// Create new connection statistics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new accepted connection
    pub fn record_accepted(&self) {
        self.total_accepted.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished relay
    pub fn record_completed(&self, result: &CopyResult) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_up
            .fetch_add(result.client_to_upstream, Ordering::Relaxed);
        self.bytes_down
            .fetch_add(result.upstream_to_client, Ordering::Relaxed);
    }

    /// Record a connection dropped by an error
    pub fn record_error(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.errored.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total accepted connections
    #[must_use]
    pub fn total_accepted(&self) -> u64 {
        self.total_accepted.load(Ordering::Relaxed)
    }

    /// Get currently active connections
    #[must_use]
    pub fn active(&self) -> u64 {
        self.active.load(Ordering::Relaxed)
    }

    /// Get completed connections
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get errored connections
    #[must_use]
    pub fn errored(&self) -> u64 {
        self.errored.load(Ordering::Relaxed)
    }

    /// Get total bytes relayed client -> upstream
    #[must_use]
    pub fn bytes_up(&self) -> u64 {
        self.bytes_up.load(Ordering::Relaxed)
    }

    /// Get total bytes relayed upstream -> client
    #[must_use]
    pub fn bytes_down(&self) -> u64 {
        self.bytes_down.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all statistics
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_accepted: self.total_accepted(),
            active: self.active(),
            completed: self.completed(),
            errored: self.errored(),
            bytes_up: self.bytes_up(),
            bytes_down: self.bytes_down(),
            timestamp_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        }
    }
}

/// Snapshot of connection statistics at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Total connections accepted
    pub total_accepted: u64,
    /// Currently active connections
    pub active: u64,
    /// Completed connections
    pub completed: u64,
    /// Errored connections
    pub errored: u64,
    /// Bytes relayed client -> upstream
    pub bytes_up: u64,
    /// Bytes relayed upstream -> client
    pub bytes_down: u64,
    /// Timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl StatsSnapshot {
    /// Get total bytes relayed (both directions)
    #[must_use]
    pub const fn total_bytes(&self) -> u64 {
        self.bytes_up + self.bytes_down
    }

    /// Get success rate as a percentage (0-100)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let total = self.completed + self.errored;
        if total == 0 {
            100.0
        } else {
            (self.completed as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_stats() {
        let stats = ConnectionStats::new();

        stats.record_accepted();
        stats.record_accepted();
        stats.record_accepted();

        assert_eq!(stats.total_accepted(), 3);
        assert_eq!(stats.active(), 3);

        stats.record_completed(&CopyResult {
            client_to_upstream: 1000,
            upstream_to_client: 2000,
        });
        assert_eq!(stats.active(), 2);
        assert_eq!(stats.completed(), 1);
        assert_eq!(stats.bytes_up(), 1000);
        assert_eq!(stats.bytes_down(), 2000);

        stats.record_error();
        assert_eq!(stats.active(), 1);
        assert_eq!(stats.errored(), 1);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = ConnectionStats::new();
        stats.record_accepted();
        stats.record_completed(&CopyResult {
            client_to_upstream: 100,
            upstream_to_client: 200,
        });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_accepted, 1);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.total_bytes(), 300);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["bytes_up"], 100);
    }

    #[test]
    fn test_success_rate() {
        let mut snapshot = StatsSnapshot {
            total_accepted: 0,
            active: 0,
            completed: 0,
            errored: 0,
            bytes_up: 0,
            bytes_down: 0,
            timestamp_ms: 0,
        };

        assert!((snapshot.success_rate() - 100.0).abs() < f64::EPSILON);

        snapshot.completed = 80;
        snapshot.errored = 20;
        assert!((snapshot.success_rate() - 80.0).abs() < f64::EPSILON);
    }
}
