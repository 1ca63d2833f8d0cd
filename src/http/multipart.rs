//! Multipart/x-mixed-replace part framing
//!
//! Wire format of one part, as browsers expect for MJPEG:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Type: image/jpeg\r\n
//! Content-Length: <n>\r\n
//! X-Timestamp: <secs>.<micros>\r\n
//! \r\n
//! <n bytes of JPEG>\r\n
//! ```
//!
//! The stream ends, when it ends at all, with the closing delimiter
//! `--<boundary>--\r\n`.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};

use crate::hub::Frame;

/// Generate a per-session boundary token
///
/// Derived from the session id and the wall clock; unique enough to never
/// collide with JPEG payload bytes in practice. Alphanumeric only, so it
/// needs no quoting in the Content-Type parameter.
pub fn generate_boundary(session_id: u64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("mjpegframe{:x}{:08x}", session_id, now.subsec_nanos())
}

/// Encode one frame as a multipart part
pub fn encode_part(boundary: &str, frame: &Frame) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nX-Timestamp: {}.{:06}\r\n\r\n",
        boundary,
        frame.len(),
        frame.timestamp.as_secs(),
        frame.timestamp.subsec_micros(),
    );

    let mut buf = BytesMut::with_capacity(header.len() + frame.len() + 2);
    buf.put_slice(header.as_bytes());
    buf.put_slice(&frame.data);
    buf.put_slice(b"\r\n");
    buf.freeze()
}

/// Encode the closing delimiter that terminates a multipart stream
pub fn encode_epilogue(boundary: &str) -> Bytes {
    Bytes::from(format!("--{}--\r\n", boundary))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn frame() -> Frame {
        Frame::new(
            7,
            Duration::from_micros(1_250_000),
            Bytes::from_static(b"\xff\xd8JPEGDATA\xff\xd9"),
        )
    }

    #[test]
    fn test_boundary_is_alphanumeric() {
        let boundary = generate_boundary(42);
        assert!(boundary.starts_with("mjpegframe"));
        assert!(boundary.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_boundaries_differ_per_session() {
        assert_ne!(generate_boundary(1), generate_boundary(2));
    }

    #[test]
    fn test_part_layout() {
        let part = encode_part("bnd", &frame());

        let header_end = part.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let header = std::str::from_utf8(&part[..header_end]).unwrap();

        assert!(header.starts_with("--bnd\r\n"));
        assert!(header.contains("Content-Type: image/jpeg\r\n"));
        assert!(header.contains("Content-Length: 12\r\n"));
        assert!(header.contains("X-Timestamp: 1.250000\r\n"));

        // Declared length matches the payload between head and trailing CRLF
        let payload = &part[header_end..part.len() - 2];
        assert_eq!(payload.len(), 12);
        assert_eq!(&part[part.len() - 2..], b"\r\n");
    }

    #[test]
    fn test_epilogue() {
        assert_eq!(&encode_epilogue("bnd")[..], b"--bnd--\r\n");
    }
}
