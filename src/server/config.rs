//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// The HTTP request head must arrive within this time
    pub handshake_timeout: Duration,

    /// A socket write exceeding this marks the client stalled
    pub write_timeout: Duration,

    /// How long shutdown waits for streaming sessions to drain
    pub shutdown_grace: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Path serving the MJPEG stream
    pub stream_path: String,

    /// Path serving a single-frame JPEG snapshot
    pub snapshot_path: String,

    /// Path serving the JSON status snapshot
    pub status_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5001".parse().unwrap(),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(5),
            tcp_nodelay: true, // Important for low latency
            stream_path: "/stream".to_string(),
            snapshot_path: "/snapshot".to_string(),
            status_path: "/status".to_string(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the shutdown grace period
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set the stream endpoint path
    ///
    /// Setting this to `/?action=stream` emulates mjpg-streamer's endpoint
    /// layout; routing matches the full request target including query.
    pub fn stream_path(mut self, path: impl Into<String>) -> Self {
        self.stream_path = path.into();
        self
    }

    /// Set the snapshot endpoint path
    pub fn snapshot_path(mut self, path: impl Into<String>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    /// Set the status endpoint path
    pub fn status_path(mut self, path: impl Into<String>) -> Self {
        self.status_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 5001);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.stream_path, "/stream");
        assert_eq!(config.snapshot_path, "/snapshot");
        assert_eq!(config.status_path, "/status");
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:5002".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .handshake_timeout(Duration::from_secs(5))
            .write_timeout(Duration::from_secs(3))
            .shutdown_grace(Duration::from_secs(1))
            .stream_path("/?action=stream");

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.write_timeout, Duration::from_secs(3));
        assert_eq!(config.shutdown_grace, Duration::from_secs(1));
        assert_eq!(config.stream_path, "/?action=stream");
    }
}
