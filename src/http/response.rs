//! HTTP response assembly
//!
//! Every response the server sends is built here so they all carry the
//! same header set: a `Server` token, `Connection: close` (one request per
//! connection), and the no-cache trio that keeps proxies and browsers from
//! caching a "current" snapshot.

use bytes::{BufMut, Bytes, BytesMut};

/// Server token sent on every response
pub const SERVER_NAME: &str = concat!("mjpeg-rs/v", env!("CARGO_PKG_VERSION"));

/// Response status codes the server emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    ServiceUnavailable,
}

impl Status {
    /// Numeric status code
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::ServiceUnavailable => 503,
        }
    }

    /// Reason phrase
    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::ServiceUnavailable => "Service Unavailable",
        }
    }
}

fn put_status_line(buf: &mut BytesMut, status: Status) {
    buf.put_slice(format!("HTTP/1.1 {} {}\r\n", status.code(), status.reason()).as_bytes());
}

fn put_common_headers(buf: &mut BytesMut) {
    buf.put_slice(format!("Server: {}\r\n", SERVER_NAME).as_bytes());
    buf.put_slice(b"Connection: close\r\n");
    buf.put_slice(
        b"Cache-Control: no-store, no-cache, must-revalidate, pre-check=0, post-check=0, max-age=0\r\n",
    );
    buf.put_slice(b"Pragma: no-cache\r\n");
    buf.put_slice(b"Expires: Mon, 3 Jan 2000 12:34:56 GMT\r\n");
}

/// Build a complete response with a body
pub fn simple_response(status: Status, content_type: &str, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(256 + body.len());
    put_status_line(&mut buf, status);
    put_common_headers(&mut buf);
    buf.put_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
    buf.put_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(body);
    buf.freeze()
}

/// Build the response head that opens an MJPEG stream
///
/// No `Content-Length`: the body is an unbounded multipart sequence,
/// terminated only by the connection closing.
pub fn stream_head(boundary: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(256);
    put_status_line(&mut buf, Status::Ok);
    put_common_headers(&mut buf);
    buf.put_slice(
        format!(
            "Content-Type: multipart/x-mixed-replace;boundary={}\r\n",
            boundary
        )
        .as_bytes(),
    );
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// The index page served at `/`
pub fn index_page(stream_path: &str, snapshot_path: &str) -> String {
    format!(
        "<html><body><h1><code>mjpeg-rs</code></h1>\
        <p><a href=\"{}\">start stream</a>\
        <p><a href=\"{}\">get snapshot</a>\
        <address>{}",
        stream_path, snapshot_path, SERVER_NAME
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_response_layout() {
        let resp = simple_response(Status::NotFound, "text/plain", b"nope");
        let text = std::str::from_utf8(&resp).unwrap();

        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains("Cache-Control: no-store"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\nnope"));
    }

    #[test]
    fn test_stream_head_layout() {
        let head = stream_head("frameXYZ");
        let text = std::str::from_utf8(&head).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: multipart/x-mixed-replace;boundary=frameXYZ\r\n"));
        assert!(!text.contains("Content-Length"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Ok.code(), 200);
        assert_eq!(Status::BadRequest.code(), 400);
        assert_eq!(Status::NotFound.code(), 404);
        assert_eq!(Status::MethodNotAllowed.code(), 405);
        assert_eq!(Status::ServiceUnavailable.code(), 503);
    }

    #[test]
    fn test_index_page_links() {
        let page = index_page("/stream", "/snapshot");
        assert!(page.contains("href=\"/stream\""));
        assert!(page.contains("href=\"/snapshot\""));
    }
}
