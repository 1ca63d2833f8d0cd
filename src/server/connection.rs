//! Per-connection driver
//!
//! Steps one accepted socket through the session state machine: read and
//! validate the request within the handshake timeout, route it, and for
//! `/stream` run the delivery loop until the client disconnects, stalls
//! past the write timeout, the hub closes, or the server shuts down.
//! Every error here is scoped to this connection; the listener only logs
//! it.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;

use crate::error::{Error, ProtocolError, Result};
use crate::http::multipart;
use crate::http::request::{self, Request, MAX_REQUEST_HEAD};
use crate::http::response::{self, Status};
use crate::hub::FrameHub;
use crate::session::SessionState;
use crate::stats::{ServerStats, ViewerGuard};

use super::config::ServerConfig;

/// One accepted connection
pub(crate) struct Connection {
    session: SessionState,
    socket: TcpStream,
    config: Arc<ServerConfig>,
    hub: Arc<FrameHub>,
    stats: Arc<ServerStats>,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    pub(crate) fn new(
        session: SessionState,
        socket: TcpStream,
        config: Arc<ServerConfig>,
        hub: Arc<FrameHub>,
        stats: Arc<ServerStats>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session,
            socket,
            config,
            hub,
            stats,
            shutdown,
        }
    }

    /// Drive the connection to completion
    pub(crate) async fn run(mut self) -> Result<()> {
        let result = self.handle().await;

        self.session.close();
        let _ = self.socket.shutdown().await;
        self.session.finish();

        tracing::debug!(
            session_id = self.session.id,
            bytes_written = self.session.bytes_written,
            duration_ms = self.session.duration().as_millis() as u64,
            "Session finished"
        );
        result
    }

    async fn handle(&mut self) -> Result<()> {
        let request = match self.read_request().await {
            Ok(request) => request,
            Err(Error::Protocol(e)) => {
                self.session.reject();
                tracing::debug!(session_id = self.session.id, error = %e, "Rejecting request");
                let body = format!("bad request: {}\n", e);
                let resp = response::simple_response(Status::BadRequest, "text/plain", body.as_bytes());
                // The client may already be gone; the 400 is best-effort
                let _ = self.write_timed(&resp).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            session_id = self.session.id,
            peer = %self.session.peer_addr,
            user_agent = request.user_agent.as_deref().unwrap_or("<no useragent>"),
            method = %request.method,
            target = %request.target,
            "HTTP request"
        );

        let target = request.target.clone();
        let known_path = target == "/"
            || target == self.config.stream_path
            || target == self.config.snapshot_path
            || target == self.config.status_path;

        if known_path && !request.is_get() {
            return self
                .reject_with(
                    Status::MethodNotAllowed,
                    &format!("method {} not allowed\n", request.method),
                )
                .await;
        }
        if !known_path {
            return self
                .reject_with(
                    Status::NotFound,
                    &format!("nothing configured for the path {:?}\n", target),
                )
                .await;
        }

        if target == self.config.stream_path {
            self.serve_stream().await
        } else if target == self.config.snapshot_path {
            self.serve_snapshot().await
        } else if target == self.config.status_path {
            self.serve_status().await
        } else {
            self.serve_index().await
        }
    }

    /// Read the request head, bounded by size and the handshake timeout
    async fn read_request(&mut self) -> Result<Request> {
        let read_head = async {
            let mut buf = BytesMut::with_capacity(1024);
            loop {
                if let Some(end) = request::find_head_end(&buf) {
                    return Ok(buf.split_to(end));
                }
                if buf.len() >= MAX_REQUEST_HEAD {
                    return Err(Error::Protocol(ProtocolError::RequestTooLarge));
                }
                let n = self.socket.read_buf(&mut buf).await?;
                if n == 0 {
                    return Err(Error::Protocol(ProtocolError::MalformedRequest(
                        "<connection closed mid-request>".to_string(),
                    )));
                }
            }
        };

        match timeout(self.config.handshake_timeout, read_head).await {
            Ok(Ok(head)) => Ok(request::parse_request_head(&head)?),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Stalled),
        }
    }

    /// Write with the configured timeout; a slow socket means a stalled client
    async fn write_timed(&mut self, data: &[u8]) -> Result<()> {
        match timeout(self.config.write_timeout, self.socket.write_all(data)).await {
            Ok(Ok(())) => {
                self.session.add_bytes_written(data.len() as u64);
                self.stats.add_bytes_sent(data.len() as u64);
                Ok(())
            }
            Ok(Err(e)) => Err(Error::Io(e)),
            Err(_) => Err(Error::Stalled),
        }
    }

    async fn reject_with(&mut self, status: Status, body: &str) -> Result<()> {
        self.session.reject();
        let resp = response::simple_response(status, "text/plain", body.as_bytes());
        self.write_timed(&resp).await
    }

    /// The delivery loop for `/stream`
    async fn serve_stream(&mut self) -> Result<()> {
        let boundary = multipart::generate_boundary(self.session.id);
        let head = response::stream_head(&boundary);

        let mut subscription = self.hub.subscribe();
        let _viewer = ViewerGuard::new(Arc::clone(&self.stats));
        self.session.begin_streaming(boundary.clone());

        self.write_timed(&head).await?;

        tracing::info!(
            session_id = self.session.id,
            subscription_id = subscription.id(),
            "Viewer streaming"
        );

        loop {
            tokio::select! {
                // Fires on shutdown signal (or the server going away)
                _ = self.shutdown.changed() => break,

                frame = subscription.recv() => match frame {
                    Some(frame) => {
                        if *self.shutdown.borrow() {
                            break;
                        }
                        let part = multipart::encode_part(&boundary, &frame);
                        self.write_timed(&part).await?;
                    }
                    None => {
                        // Producer is done: terminate the multipart body
                        let _ = self.write_timed(&multipart::encode_epilogue(&boundary)).await;
                        break;
                    }
                },
            }
        }

        tracing::info!(
            session_id = self.session.id,
            last_sequence = subscription.last_sequence(),
            skipped = subscription.dropped_frames(),
            "Viewer leaving"
        );
        Ok(())
    }

    async fn serve_snapshot(&mut self) -> Result<()> {
        match self.hub.current_frame() {
            Some(frame) => {
                let resp = response::simple_response(Status::Ok, "image/jpeg", &frame.data);
                self.write_timed(&resp).await
            }
            None => {
                let resp = response::simple_response(
                    Status::ServiceUnavailable,
                    "text/plain",
                    b"no frame available yet\n",
                );
                self.write_timed(&resp).await
            }
        }
    }

    async fn serve_status(&mut self) -> Result<()> {
        let snapshot = self.stats.snapshot(&self.hub);
        let resp = match serde_json::to_vec(&snapshot) {
            Ok(body) => response::simple_response(Status::Ok, "application/json", &body),
            Err(e) => {
                tracing::error!(error = %e, "Status snapshot failed to serialize");
                response::simple_response(
                    Status::ServiceUnavailable,
                    "text/plain",
                    b"status unavailable\n",
                )
            }
        };
        self.write_timed(&resp).await
    }

    async fn serve_index(&mut self) -> Result<()> {
        let page = response::index_page(&self.config.stream_path, &self.config.snapshot_path);
        let resp = response::simple_response(Status::Ok, "text/html", page.as_bytes());
        self.write_timed(&resp).await
    }
}
