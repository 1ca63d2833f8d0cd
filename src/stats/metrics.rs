//! Server-wide counters
//!
//! One shared object of atomics instead of ambient globals, so lifecycle
//! stays explicit: created with the server, readable from any task, reset
//! by dropping. The `/status` endpoint serializes a [`StatusSnapshot`] of
//! it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::hub::FrameHub;

/// Process-wide streaming statistics
#[derive(Debug)]
pub struct ServerStats {
    /// Sessions currently in the Streaming phase
    active_viewers: AtomicU64,
    /// Connections accepted since startup
    total_connections: AtomicU64,
    /// Bytes written to viewer sockets
    bytes_sent: AtomicU64,
    /// Server start time
    started_at: Instant,
}

impl ServerStats {
    /// Create a new stats object
    pub fn new() -> Self {
        Self {
            active_viewers: AtomicU64::new(0),
            total_connections: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Record an accepted connection
    pub fn connection_accepted(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes written to a viewer socket
    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Number of sessions currently streaming
    pub fn active_viewers(&self) -> u64 {
        self.active_viewers.load(Ordering::Relaxed)
    }

    /// Connections accepted since startup
    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Bytes written to viewer sockets since startup
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Point-in-time snapshot for the status endpoint
    pub fn snapshot(&self, hub: &FrameHub) -> StatusSnapshot {
        StatusSnapshot {
            active_viewers: self.active_viewers(),
            total_connections: self.total_connections(),
            bytes_sent: self.bytes_sent(),
            last_sequence: hub.last_sequence(),
            uptime_secs: self.uptime_secs(),
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for the active-viewer count
///
/// Increments on creation, decrements on drop. A session entering
/// Streaming holds one of these for its lifetime, so the counter moves
/// exactly once in each direction no matter how the session ends.
pub struct ViewerGuard {
    stats: Arc<ServerStats>,
}

impl ViewerGuard {
    /// Register a streaming viewer
    pub fn new(stats: Arc<ServerStats>) -> Self {
        stats.active_viewers.fetch_add(1, Ordering::Relaxed);
        Self { stats }
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.stats.active_viewers.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Serializable view of [`ServerStats`]
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Sessions currently streaming
    pub active_viewers: u64,
    /// Connections accepted since startup
    pub total_connections: u64,
    /// Bytes written to viewer sockets
    pub bytes_sent: u64,
    /// Sequence number of the most recent frame (0 before the first)
    pub last_sequence: u64,
    /// Seconds since server start
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = ServerStats::new();
        stats.connection_accepted();
        stats.connection_accepted();
        stats.add_bytes_sent(1024);

        assert_eq!(stats.total_connections(), 2);
        assert_eq!(stats.bytes_sent(), 1024);
        assert_eq!(stats.active_viewers(), 0);
    }

    #[test]
    fn test_viewer_guard_decrements_exactly_once() {
        let stats = Arc::new(ServerStats::new());

        let guard = ViewerGuard::new(Arc::clone(&stats));
        assert_eq!(stats.active_viewers(), 1);

        let second = ViewerGuard::new(Arc::clone(&stats));
        assert_eq!(stats.active_viewers(), 2);

        drop(guard);
        assert_eq!(stats.active_viewers(), 1);
        drop(second);
        assert_eq!(stats.active_viewers(), 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = ServerStats::new();
        let hub = FrameHub::new();
        stats.connection_accepted();

        let snapshot = stats.snapshot(&hub);
        let json = serde_json::to_string(&snapshot).unwrap();

        assert!(json.contains("\"active_viewers\":0"));
        assert!(json.contains("\"total_connections\":1"));
        assert!(json.contains("\"last_sequence\":0"));
    }
}
