//! Client session state machine
//!
//! Tracks one HTTP connection from accept to teardown. The connection
//! driver in [`crate::server`] owns a `SessionState` exclusively; nothing
//! here is shared across tasks.

use std::net::SocketAddr;
use std::time::Instant;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// TCP connected, waiting for and validating the HTTP request
    Handshaking,
    /// Multipart response open, frames being delivered
    Streaming,
    /// Request was rejected with an HTTP error status
    Rejected,
    /// Session is tearing down (unsubscribe, release the socket)
    Closing,
    /// Session fully closed
    Closed,
}

/// Per-connection session state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current phase
    pub phase: SessionPhase,

    /// When the connection was accepted
    pub connected_at: Instant,

    /// Multipart boundary token (set on entering Streaming)
    pub boundary: Option<String>,

    /// Total bytes written to the socket
    pub bytes_written: u64,

    /// Last successful write or handshake progress
    pub last_activity: Instant,
}

impl SessionState {
    /// Create a new session in the Handshaking phase
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Handshaking,
            connected_at: now,
            boundary: None,
            bytes_written: 0,
            last_activity: now,
        }
    }

    /// Enter Streaming with the session's boundary token
    pub fn begin_streaming(&mut self, boundary: String) {
        if self.phase == SessionPhase::Handshaking {
            self.boundary = Some(boundary);
            self.phase = SessionPhase::Streaming;
        }
    }

    /// Mark the request rejected
    pub fn reject(&mut self) {
        if self.phase == SessionPhase::Handshaking {
            self.phase = SessionPhase::Rejected;
        }
    }

    /// Begin teardown; reachable from any phase, idempotent
    pub fn close(&mut self) {
        if self.phase != SessionPhase::Closed {
            self.phase = SessionPhase::Closing;
        }
    }

    /// Mark teardown complete
    pub fn finish(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    /// Record a successful write
    pub fn add_bytes_written(&mut self, bytes: u64) {
        self.bytes_written += bytes;
        self.last_activity = Instant::now();
    }

    /// Whether the session is delivering frames
    pub fn is_streaming(&self) -> bool {
        self.phase == SessionPhase::Streaming
    }

    /// Time since the connection was accepted
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn state() -> SessionState {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5001);
        SessionState::new(1, addr)
    }

    #[test]
    fn test_streaming_lifecycle() {
        let mut s = state();
        assert_eq!(s.phase, SessionPhase::Handshaking);

        s.begin_streaming("bnd".to_string());
        assert_eq!(s.phase, SessionPhase::Streaming);
        assert!(s.is_streaming());
        assert_eq!(s.boundary.as_deref(), Some("bnd"));

        s.close();
        assert_eq!(s.phase, SessionPhase::Closing);
        s.finish();
        assert_eq!(s.phase, SessionPhase::Closed);
    }

    #[test]
    fn test_rejected_lifecycle() {
        let mut s = state();
        s.reject();
        assert_eq!(s.phase, SessionPhase::Rejected);
        assert!(!s.is_streaming());

        // Can't start streaming after rejection
        s.begin_streaming("bnd".to_string());
        assert_eq!(s.phase, SessionPhase::Rejected);
    }

    #[test]
    fn test_close_is_idempotent_and_terminal() {
        let mut s = state();
        s.close();
        s.close();
        assert_eq!(s.phase, SessionPhase::Closing);

        s.finish();
        s.close();
        // Closed is terminal
        assert_eq!(s.phase, SessionPhase::Closed);
    }

    #[test]
    fn test_bytes_written_accumulates() {
        let mut s = state();
        s.add_bytes_written(100);
        s.add_bytes_written(50);
        assert_eq!(s.bytes_written, 150);
    }
}
