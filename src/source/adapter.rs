//! Source adapter
//!
//! Owns a [`FrameSource`] and bridges it to the hub: a pump task drains
//! the bounded hand-off channel and publishes each captured frame. The
//! adapter is the single place where the external pipeline's lifecycle
//! (start, stop, failure events) meets the rest of the server.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::hub::FrameHub;

use super::config::SourceConfig;
use super::{FrameSink, FrameSource, SourceEvent, HANDOFF_DEPTH};

/// Bridges one frame source to one hub
pub struct SourceAdapter {
    source: Arc<dyn FrameSource>,
    config: SourceConfig,
    hub: Arc<FrameHub>,
    inner: Mutex<AdapterInner>,
}

#[derive(Default)]
struct AdapterInner {
    running: bool,
    pump: Option<JoinHandle<()>>,
    events: Option<mpsc::UnboundedReceiver<SourceEvent>>,
}

impl SourceAdapter {
    /// Create an adapter wiring `source` to `hub`
    pub fn new(source: Arc<dyn FrameSource>, config: SourceConfig, hub: Arc<FrameHub>) -> Self {
        Self {
            source,
            config,
            hub,
            inner: Mutex::new(AdapterInner::default()),
        }
    }

    /// Start the source and the pump task
    ///
    /// Idempotent while running. Fails with
    /// [`SourceError::Unavailable`](crate::error::SourceError::Unavailable)
    /// if the underlying pipeline cannot be opened.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.running {
            return Ok(());
        }

        let (frame_tx, mut frame_rx) = mpsc::channel(HANDOFF_DEPTH);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let sink = FrameSink::new(frame_tx, event_tx);

        self.source.start(&self.config, sink)?;

        let hub = Arc::clone(&self.hub);
        inner.pump = Some(tokio::spawn(async move {
            while let Some(captured) = frame_rx.recv().await {
                hub.publish(captured.data, captured.timestamp);
            }
            tracing::debug!("Source hand-off closed, pump finished");
        }));
        inner.events = Some(event_rx);
        inner.running = true;

        tracing::info!(
            device = %self.config.device,
            width = self.config.width,
            height = self.config.height,
            fps = self.config.fps,
            "Source started"
        );
        Ok(())
    }

    /// Stop the source; safe to call multiple times
    ///
    /// The pump finishes once the source releases its sink. Already
    /// published frames stay available through the hub.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.running {
            return;
        }
        self.source.stop();
        inner.pump = None;
        inner.running = false;
        tracing::info!("Source stopped");
    }

    /// Whether the adapter is currently running
    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    /// Take the source event channel
    ///
    /// The embedder drains this to observe mid-run pipeline failures and
    /// end-of-stream. Returns `None` before `start` or if already taken.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SourceEvent>> {
        self.inner.lock().unwrap().events.take()
    }
}
