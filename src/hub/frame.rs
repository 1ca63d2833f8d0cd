//! Frame value type
//!
//! A `Frame` is one JPEG-encoded image plus the metadata the delivery path
//! needs: a sequence number assigned by the hub at publish time and the
//! capture timestamp reported by the source. Frames are immutable after
//! construction and shared as `Arc<Frame>`, so fan-out to any number of
//! subscribers never copies the payload.

use std::time::Duration;

use bytes::Bytes;

/// One JPEG-encoded frame
///
/// Cheap to share: the payload is reference-counted `Bytes`.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Sequence number, strictly increasing across the hub's lifetime
    pub sequence: u64,

    /// Capture timestamp, measured from when the source started
    pub timestamp: Duration,

    /// JPEG payload
    pub data: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(sequence: u64, timestamp: Duration, data: Bytes) -> Self {
        Self {
            sequence,
            timestamp,
            data,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
