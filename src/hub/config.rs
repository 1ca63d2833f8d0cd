//! Hub configuration

/// Configuration for the frame hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-subscriber delivery queue capacity
    ///
    /// When a publish would overflow a subscriber's queue, the oldest
    /// queued frame is dropped in favor of the new one. Small values keep
    /// per-viewer latency low; 1-2 is the useful range for a live view.
    pub queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { queue_capacity: 2 }
    }
}

impl HubConfig {
    /// Set the per-subscriber queue capacity (clamped to at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}
