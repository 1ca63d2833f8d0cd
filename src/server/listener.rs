//! HTTP listener
//!
//! Handles the TCP accept loop and spawns one connection task per viewer.
//! Frame data never passes through here; sessions pull it from the hub.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::hub::FrameHub;
use crate::session::SessionState;
use crate::stats::ServerStats;

use super::config::ServerConfig;
use super::connection::Connection;

/// MJPEG streaming server
pub struct StreamServer {
    config: Arc<ServerConfig>,
    hub: Arc<FrameHub>,
    stats: Arc<ServerStats>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown_tx: watch::Sender<bool>,
}

impl StreamServer {
    /// Create a new server delivering frames from `hub`
    pub fn new(config: ServerConfig, hub: Arc<FrameHub>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config: Arc::new(config),
            hub,
            stats: Arc::new(ServerStats::new()),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown_tx,
        }
    }

    /// Get a reference to the frame hub
    pub fn hub(&self) -> &Arc<FrameHub> {
        &self.hub
    }

    /// Get a reference to the server statistics
    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server until it fails
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run the server with graceful shutdown
    ///
    /// Binds the configured address, serves until `shutdown` completes,
    /// then stops accepting, signals all sessions to close, and waits up
    /// to the configured grace period for streaming sessions to drain.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| Error::Bind {
                addr: self.config.bind_addr,
                source: e,
            })?;
        tracing::info!(addr = %self.config.bind_addr, "MJPEG server listening");
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let result = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        // Stop accepting before draining sessions
        drop(listener);
        self.drain_sessions().await;
        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit; the permit rides along with the task
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.stats.connection_accepted();

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(session_id = session_id, error = %e, "Failed to set nodelay");
            }
        }

        let connection = Connection::new(
            SessionState::new(session_id, peer_addr),
            socket,
            Arc::clone(&self.config),
            Arc::clone(&self.hub),
            Arc::clone(&self.stats),
            self.shutdown_tx.subscribe(),
        );

        tokio::spawn(async move {
            let _permit = permit;

            if let Err(e) = connection.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }

    /// Signal sessions to close and wait, bounded by the grace period
    async fn drain_sessions(&self) {
        let _ = self.shutdown_tx.send(true);

        let deadline = Instant::now() + self.config.shutdown_grace;
        while self.stats.active_viewers() > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let remaining = self.stats.active_viewers();
        if remaining > 0 {
            tracing::warn!(remaining = remaining, "Grace period expired with viewers active");
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    use super::*;

    fn payload() -> Bytes {
        Bytes::from_static(b"\xff\xd8test-jpeg-payload\xff\xd9")
    }

    /// Bind an ephemeral port and serve until the returned sender fires
    async fn spawn_server(config: ServerConfig) -> (Arc<StreamServer>, SocketAddr, oneshot::Sender<()>) {
        let hub = Arc::new(FrameHub::new());
        let server = Arc::new(StreamServer::new(config, hub));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let serving = Arc::clone(&server);
        tokio::spawn(async move {
            serving
                .serve(listener, async {
                    let _ = stop_rx.await;
                })
                .await
                .unwrap();
        });

        (server, addr, stop_tx)
    }

    async fn send_request(addr: SocketAddr, request: &str) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        stream
    }

    /// Read until the response head is complete; returns (head, leftover body bytes)
    async fn read_head(stream: &mut TcpStream) -> (String, Vec<u8>) {
        let mut buf = Vec::new();
        loop {
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8(buf[..pos].to_vec()).unwrap();
                let rest = buf[pos + 4..].to_vec();
                return (head, rest);
            }
            let mut chunk = [0u8; 1024];
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before head completed");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn read_to_eof(stream: &mut TcpStream, buf: &mut Vec<u8>) {
        let mut chunk = [0u8; 4096];
        loop {
            let n = match stream.read(&mut chunk).await {
                Ok(n) => n,
                // A dropped socket with unread request bytes surfaces as an
                // RST (ConnectionReset) rather than a clean EOF on Linux.
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => return,
                Err(e) => panic!("read failed: {e}"),
            };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Parse complete multipart parts out of `body`; returns (content_length, payload, x_timestamp)
    fn parse_parts(body: &[u8], boundary: &str) -> Vec<(usize, Vec<u8>, String)> {
        let delim = format!("--{}\r\n", boundary);
        let mut parts = Vec::new();
        let mut rest = body;

        while let Some(start) = rest
            .windows(delim.len())
            .position(|w| w == delim.as_bytes())
        {
            rest = &rest[start + delim.len()..];
            let Some(head_end) = rest.windows(4).position(|w| w == b"\r\n\r\n") else {
                break;
            };
            let head = std::str::from_utf8(&rest[..head_end]).unwrap();
            let mut content_length = None;
            let mut timestamp = String::new();
            for line in head.split("\r\n") {
                if let Some(v) = line.strip_prefix("Content-Length: ") {
                    content_length = Some(v.parse::<usize>().unwrap());
                }
                if let Some(v) = line.strip_prefix("X-Timestamp: ") {
                    timestamp = v.to_string();
                }
            }
            let content_length = content_length.expect("part without Content-Length");
            let payload_start = head_end + 4;
            if rest.len() < payload_start + content_length + 2 {
                break; // incomplete part
            }
            let payload = rest[payload_start..payload_start + content_length].to_vec();
            parts.push((content_length, payload, timestamp));
            rest = &rest[payload_start + content_length + 2..];
        }
        parts
    }

    fn boundary_from_head(head: &str) -> String {
        let ct_line = head
            .lines()
            .find(|l| l.starts_with("Content-Type:"))
            .expect("no content type");
        ct_line
            .split("boundary=")
            .nth(1)
            .expect("no boundary parameter")
            .trim()
            .to_string()
    }

    #[tokio::test]
    async fn test_stream_endpoint_serves_multipart() {
        let (server, addr, stop) = spawn_server(ServerConfig::default()).await;

        let mut client =
            send_request(addr, "GET /stream HTTP/1.1\r\nHost: x\r\n\r\n").await;

        // Publish frames until the client has its first complete part
        let hub = Arc::clone(server.hub());
        let publisher = tokio::spawn(async move {
            loop {
                hub.publish(payload(), Duration::from_millis(0));
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let (head, mut body) = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains("multipart/x-mixed-replace"));
        let boundary = boundary_from_head(&head);
        assert!(!boundary.is_empty());

        let mut chunk = [0u8; 4096];
        let parts = loop {
            let parts = parse_parts(&body, &boundary);
            if !parts.is_empty() {
                break parts;
            }
            let n = client.read(&mut chunk).await.unwrap();
            assert!(n > 0);
            body.extend_from_slice(&chunk[..n]);
        };

        let (content_length, part_payload, _) = &parts[0];
        assert_eq!(*content_length, payload().len());
        assert_eq!(part_payload.as_slice(), payload().as_ref());

        publisher.abort();
        let _ = stop.send(());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let (_server, addr, stop) = spawn_server(ServerConfig::default()).await;

        let mut client = send_request(addr, "GET /unknown HTTP/1.1\r\n\r\n").await;
        let (head, _) = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 404 Not Found"));

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn test_post_to_stream_is_405() {
        let (_server, addr, stop) = spawn_server(ServerConfig::default()).await;

        let mut client = send_request(addr, "POST /stream HTTP/1.1\r\n\r\n").await;
        let (head, _) = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 405 Method Not Allowed"));

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn test_malformed_request_is_400() {
        let (_server, addr, stop) = spawn_server(ServerConfig::default()).await;

        let mut client = send_request(addr, "NOT A REQUEST LINE AT ALL\r\n\r\n").await;
        let (head, _) = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 400 Bad Request"));

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn test_snapshot_returns_current_frame() {
        let (server, addr, stop) = spawn_server(ServerConfig::default()).await;

        // No frame yet
        let mut client = send_request(addr, "GET /snapshot HTTP/1.1\r\n\r\n").await;
        let (head, _) = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 503"));

        server.hub().publish(payload(), Duration::from_millis(42));

        let mut client = send_request(addr, "GET /snapshot HTTP/1.1\r\n\r\n").await;
        let (head, mut body) = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains("Content-Type: image/jpeg"));
        read_to_eof(&mut client, &mut body).await;
        assert_eq!(body.as_slice(), payload().as_ref());

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn test_index_page_links_endpoints() {
        let (_server, addr, stop) = spawn_server(ServerConfig::default()).await;

        let mut client = send_request(addr, "GET / HTTP/1.1\r\n\r\n").await;
        let (head, mut body) = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains("Content-Type: text/html"));
        read_to_eof(&mut client, &mut body).await;
        let page = String::from_utf8(body).unwrap();
        assert!(page.contains("/stream"));
        assert!(page.contains("/snapshot"));

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn test_status_reports_viewers() {
        let (server, addr, stop) = spawn_server(ServerConfig::default()).await;

        let _viewer = send_request(addr, "GET /stream HTTP/1.1\r\n\r\n").await;
        wait_for(|| server.stats().active_viewers() == 1).await;

        let mut client = send_request(addr, "GET /status HTTP/1.1\r\n\r\n").await;
        let (head, mut body) = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        assert!(head.contains("Content-Type: application/json"));
        read_to_eof(&mut client, &mut body).await;
        let json = String::from_utf8(body).unwrap();
        assert!(json.contains("\"active_viewers\":1"));

        let _ = stop.send(());
    }

    /// Read a terminated stream to EOF and check its multipart invariants
    async fn verify_stream_to_end(client: &mut TcpStream, expected_last_timestamp: &str) {
        let (head, mut body) = read_head(client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        let boundary = boundary_from_head(&head);
        read_to_eof(client, &mut body).await;

        let parts = parse_parts(&body, &boundary);
        assert!(!parts.is_empty());
        let timestamps: Vec<&str> = parts.iter().map(|(_, _, ts)| ts.as_str()).collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted, "timestamps went backwards");
        assert_eq!(*timestamps.last().unwrap(), expected_last_timestamp);

        // Closing delimiter terminates the stream
        let tail = format!("--{}--\r\n", boundary);
        assert!(body.ends_with(tail.as_bytes()));
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within deadline");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_disconnect_removes_subscription_and_viewer() {
        let (server, addr, stop) = spawn_server(ServerConfig::default()).await;

        let client = send_request(addr, "GET /stream HTTP/1.1\r\n\r\n").await;
        wait_for(|| server.stats().active_viewers() == 1).await;
        assert_eq!(server.hub().subscriber_count(), 1);

        drop(client);
        // The session notices on its next write; keep frames flowing
        let hub = Arc::clone(server.hub());
        let publisher = tokio::spawn(async move {
            loop {
                hub.publish(payload(), Duration::from_millis(0));
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        wait_for(|| server.stats().active_viewers() == 0).await;
        wait_for(|| server.hub().subscriber_count() == 0).await;

        publisher.abort();
        let _ = stop.send(());
    }

    #[tokio::test]
    async fn test_connection_limit_rejects_excess() {
        let (server, addr, stop) =
            spawn_server(ServerConfig::default().max_connections(1)).await;

        let _first = send_request(addr, "GET /stream HTTP/1.1\r\n\r\n").await;
        wait_for(|| server.stats().active_viewers() == 1).await;

        // Over the limit: socket is dropped without a response
        let mut second = send_request(addr, "GET /status HTTP/1.1\r\n\r\n").await;
        let mut buf = Vec::new();
        read_to_eof(&mut second, &mut buf).await;
        assert!(buf.is_empty());

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn test_two_clients_see_monotonic_streams_ending_at_last_frame() {
        let (server, addr, stop) = spawn_server(ServerConfig::default()).await;

        let mut a = send_request(addr, "GET /stream HTTP/1.1\r\n\r\n").await;
        let mut b = send_request(addr, "GET /stream HTTP/1.1\r\n\r\n").await;
        wait_for(|| server.stats().active_viewers() == 2).await;

        // Distinct timestamps let the test identify which frames arrived
        for i in 0..20u64 {
            server.hub().publish(payload(), Duration::from_millis(i));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        server.hub().close();

        verify_stream_to_end(&mut a, "0.019000").await;
        verify_stream_to_end(&mut b, "0.019000").await;

        let _ = stop.send(());
    }

    #[tokio::test]
    async fn test_shutdown_ends_streaming_sessions() {
        let config = ServerConfig::default().shutdown_grace(Duration::from_secs(2));
        let (server, addr, stop) = spawn_server(config).await;

        let mut client = send_request(addr, "GET /stream HTTP/1.1\r\n\r\n").await;
        wait_for(|| server.stats().active_viewers() == 1).await;

        let _ = stop.send(());

        // The session observes the shutdown watch and closes the socket
        let (head, mut body) = read_head(&mut client).await;
        assert!(head.starts_with("HTTP/1.1 200 OK"));
        read_to_eof(&mut client, &mut body).await;
        wait_for(|| server.stats().active_viewers() == 0).await;
    }
}
