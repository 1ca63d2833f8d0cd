//! Frame source boundary
//!
//! The capture/encode pipeline is external to this crate and modeled as a
//! capability: something that can be started with a [`SourceConfig`],
//! pushes JPEG frames into a [`FrameSink`], and can be stopped. The
//! [`SourceAdapter`] owns that capability and pumps its frames into the
//! hub; [`PatternSource`] is a built-in synthetic implementation used by
//! tests and the demo.
//!
//! The hand-off from source to adapter is a bounded channel of depth 2
//! with drop-on-full, so a stalled pump can never back up into the
//! pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::SourceError;

pub mod adapter;
pub mod config;
pub mod pattern;

pub use adapter::SourceAdapter;
pub use config::SourceConfig;
pub use pattern::PatternSource;

/// Depth of the source-to-adapter hand-off channel
pub(crate) const HANDOFF_DEPTH: usize = 2;

/// A frame as produced by a source, before the hub assigns a sequence
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// JPEG payload
    pub data: Bytes,
    /// Capture timestamp, measured from source start
    pub timestamp: Duration,
}

/// Out-of-band events a source reports to its embedder
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// The pipeline failed mid-run
    Error(SourceError),
    /// The pipeline reached end-of-stream
    Eos,
}

/// Hand-off point a source pushes frames and events into
///
/// Cloneable; all clones feed the same adapter. `push_frame` never blocks:
/// if the pump has not yet drained the previous frames, the new frame is
/// dropped and counted.
#[derive(Debug, Clone)]
pub struct FrameSink {
    frames: mpsc::Sender<CapturedFrame>,
    events: mpsc::UnboundedSender<SourceEvent>,
    dropped: Arc<AtomicU64>,
}

impl FrameSink {
    pub(crate) fn new(
        frames: mpsc::Sender<CapturedFrame>,
        events: mpsc::UnboundedSender<SourceEvent>,
    ) -> Self {
        Self {
            frames,
            events,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push one encoded frame
    ///
    /// Returns `false` once the adapter side has shut down, at which point
    /// the source should stop producing.
    pub fn push_frame(&self, data: Bytes, timestamp: Duration) -> bool {
        match self.frames.try_send(CapturedFrame { data, timestamp }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::trace!(dropped = dropped, "Hand-off full, frame dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Report a mid-run pipeline failure
    pub fn error(&self, error: SourceError) {
        let _ = self.events.send(SourceEvent::Error(error));
    }

    /// Report end-of-stream
    pub fn eos(&self) {
        let _ = self.events.send(SourceEvent::Eos);
    }

    /// Frames dropped at the hand-off so far
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Capability interface for an external frame producer
///
/// Implementations wrap whatever capture/encode facility is available and
/// deliver JPEG frames through the sink. `start` must be idempotent while
/// the source is running; `stop` must be safe to call repeatedly and
/// release the underlying pipeline.
pub trait FrameSource: Send + Sync {
    /// Open the pipeline and begin producing frames into `sink`
    ///
    /// Fails with [`SourceError::Unavailable`] if the device or pipeline
    /// cannot be opened. Must be called from within a tokio runtime.
    fn start(&self, config: &SourceConfig, sink: FrameSink) -> Result<(), SourceError>;

    /// Release the pipeline; safe to call multiple times
    fn stop(&self);
}
