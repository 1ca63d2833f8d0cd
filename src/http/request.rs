//! Minimal HTTP/1.x request parsing
//!
//! The server only ever routes on the request line and logs the
//! user-agent, so this is a deliberately small parser: find the end of the
//! head, split the request line, scan the headers for the one field we
//! care about. Anything that does not look like
//! `METHOD SP target SP HTTP/x.y` is rejected.

use crate::error::ProtocolError;

/// Upper bound on the request head; longer heads are rejected
pub const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// A parsed request head
#[derive(Debug, Clone)]
pub struct Request {
    /// Request method, as sent (e.g. "GET")
    pub method: String,
    /// Request target including any query (e.g. "/stream", "/?action=stream")
    pub target: String,
    /// User-Agent header, if present (logging only)
    pub user_agent: Option<String>,
}

impl Request {
    /// Whether this is a GET request
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// Locate the end of the request head (`\r\n\r\n`)
///
/// Returns the length of the head including the terminator, or `None` if
/// the head is not yet complete.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// Parse a complete request head
pub fn parse_request_head(head: &[u8]) -> Result<Request, ProtocolError> {
    let text = std::str::from_utf8(head)
        .map_err(|_| ProtocolError::MalformedRequest("<non-utf8>".to_string()))?;

    let mut lines = text.split("\r\n");
    let request_line = lines.next().unwrap_or("");

    let mut parts = request_line.split(' ');
    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next())
    {
        (Some(m), Some(t), Some(v), None) if !m.is_empty() && !t.is_empty() => (m, t, v),
        _ => return Err(ProtocolError::MalformedRequest(request_line.to_string())),
    };

    if !method.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(ProtocolError::MalformedRequest(request_line.to_string()));
    }
    if !target.starts_with('/') {
        return Err(ProtocolError::MalformedRequest(request_line.to_string()));
    }
    if !version.starts_with("HTTP/") {
        return Err(ProtocolError::MalformedRequest(request_line.to_string()));
    }

    let mut user_agent = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("user-agent") {
                user_agent = Some(value.trim().to_string());
                break;
            }
        }
    }

    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        user_agent,
    })
}
