//! Error types
//!
//! Only startup-time errors (`Bind`, `Source(Unavailable)`) are fatal to the
//! process; everything else is scoped to a single connection and handled by
//! closing that connection.

use std::net::SocketAddr;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O error on a socket
    Io(std::io::Error),

    /// Listener could not bind its address
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Frame source error
    Source(SourceError),

    /// Client sent a request we reject
    Protocol(ProtocolError),

    /// Client write or handshake exceeded its timeout
    Stalled,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Bind { addr, source } => write!(f, "failed to bind {}: {}", addr, source),
            Error::Source(e) => write!(f, "source error: {}", e),
            Error::Protocol(e) => write!(f, "protocol error: {}", e),
            Error::Stalled => write!(f, "client stalled past timeout"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Bind { source, .. } => Some(source),
            Error::Source(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Stalled => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<SourceError> for Error {
    fn from(e: SourceError) -> Self {
        Error::Source(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

/// Error type for the frame source boundary
#[derive(Debug, Clone)]
pub enum SourceError {
    /// The capture/encode pipeline could not be opened (fatal at startup)
    Unavailable(String),
    /// The pipeline failed mid-run
    Failed(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "source unavailable: {}", msg),
            SourceError::Failed(msg) => write!(f, "source failed: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// Error type for client-side HTTP protocol violations
#[derive(Debug, Clone)]
pub enum ProtocolError {
    /// Request line could not be parsed
    MalformedRequest(String),
    /// Known path requested with a method other than GET
    UnsupportedMethod(String),
    /// No endpoint configured for the path
    UnknownPath(String),
    /// Request head exceeded the size limit before terminating
    RequestTooLarge,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::MalformedRequest(line) => {
                write!(f, "malformed request line: {:?}", line)
            }
            ProtocolError::UnsupportedMethod(method) => {
                write!(f, "unsupported method: {}", method)
            }
            ProtocolError::UnknownPath(path) => write!(f, "unknown path: {:?}", path),
            ProtocolError::RequestTooLarge => write!(f, "request head too large"),
        }
    }
}

impl std::error::Error for ProtocolError {}
