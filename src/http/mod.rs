//! HTTP plumbing
//!
//! Just enough HTTP/1.1 to serve an MJPEG stream: request-head parsing for
//! routing, response assembly with the shared header set, and
//! multipart/x-mixed-replace part framing. The connection layer in
//! [`crate::server`] owns the sockets; nothing here does I/O.

pub mod multipart;
pub mod request;
pub mod response;

pub use request::{Request, MAX_REQUEST_HEAD};
pub use response::{Status, SERVER_NAME};
