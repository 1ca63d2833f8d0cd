//! Synthetic frame source
//!
//! Produces a fixed 1x1 grey JPEG at the configured frame rate. Stands in
//! for a real capture pipeline in tests and in the demo server, and serves
//! as the reference implementation of the [`FrameSource`] contract.

use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::SourceError;

use super::config::SourceConfig;
use super::{FrameSink, FrameSource};

/// Smallest JPEG that renders in common browsers: a single grey pixel.
const PATTERN_JPEG: &[u8] = &[
    // SOI + APP0 (JFIF)
    0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0x4a, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01, 0x00,
    0x48, 0x00, 0x48, 0x00, 0x00,
    // DQT
    0xff, 0xdb, 0x00, 0x43, 0x00, 0x03, 0x02, 0x02, 0x02, 0x02, 0x02, 0x03, 0x02, 0x02, 0x02,
    0x03, 0x03, 0x03, 0x03, 0x04, 0x06, 0x04, 0x04, 0x04, 0x04, 0x04, 0x08, 0x06, 0x06, 0x05,
    0x06, 0x09, 0x08, 0x0a, 0x0a, 0x09, 0x08, 0x09, 0x09, 0x0a, 0x0c, 0x0f, 0x0c, 0x0a, 0x0b,
    0x0e, 0x0b, 0x09, 0x09, 0x0d, 0x11, 0x0d, 0x0e, 0x0f, 0x10, 0x10, 0x11, 0x10, 0x0a, 0x0c,
    0x12, 0x13, 0x12, 0x10, 0x13, 0x0f, 0x10, 0x10, 0x10,
    // SOF, 1x1, one component
    0xff, 0xc9, 0x00, 0x0b, 0x08, 0x00, 0x01, 0x00, 0x01, 0x01, 0x01, 0x11, 0x00,
    // DAC
    0xff, 0xcc, 0x00, 0x06, 0x00, 0x10, 0x10, 0x05,
    // SOS + entropy data + EOI
    0xff, 0xda, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3f, 0x00, 0xd2, 0xcf, 0x20, 0xff, 0xd9,
];

/// Synthetic JPEG frame source
pub struct PatternSource {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PatternSource {
    /// Create a new pattern source
    pub fn new() -> Self {
        Self {
            task: Mutex::new(None),
        }
    }

    /// The JPEG payload every produced frame carries
    pub fn payload() -> Bytes {
        Bytes::from_static(PATTERN_JPEG)
    }
}

impl Default for PatternSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for PatternSource {
    fn start(&self, config: &SourceConfig, sink: FrameSink) -> Result<(), SourceError> {
        let mut task = self.task.lock().unwrap();
        if task.is_some() {
            return Ok(());
        }
        if config.fps == 0 {
            return Err(SourceError::Unavailable(
                "frame rate must be positive".to_string(),
            ));
        }

        let interval = Duration::from_secs(1) / config.fps;
        *task = Some(tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !sink.push_frame(Self::payload(), started.elapsed()) {
                    // Adapter gone, nothing left to produce for
                    break;
                }
            }
        }));
        Ok(())
    }

    fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
        }
    }
}
