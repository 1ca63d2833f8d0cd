//! Frame hub implementation
//!
//! The hub is the single fan-out point between the frame source and the
//! client sessions. `publish` runs on the source pump's path: it must
//! complete in bounded time no matter how many subscribers exist or how
//! stalled they are, so all shared state sits behind short
//! `std::sync::Mutex` sections and the per-subscriber queues never block
//! the publisher (see [`super::queue`]).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use super::config::HubConfig;
use super::frame::Frame;
use super::queue::FrameQueue;

/// Fan-out hub distributing frames from one producer to many subscribers
pub struct FrameHub {
    /// Live subscriber queues, keyed by subscription id
    subscribers: Mutex<HashMap<u64, Arc<FrameQueue>>>,

    /// Most recently published frame (served by `/snapshot`)
    current: Mutex<Option<Arc<Frame>>>,

    /// Last assigned sequence number
    sequence: AtomicU64,

    /// Next subscription id to allocate
    next_subscriber_id: AtomicU64,

    /// Set once the producer is done; new publishes become no-ops
    closed: AtomicBool,

    config: HubConfig,
}

impl FrameHub {
    /// Create a new hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            sequence: AtomicU64::new(0),
            next_subscriber_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Publish a new frame to all current subscribers
    ///
    /// Assigns the next sequence number, records the frame as current, and
    /// enqueues it on every subscriber queue under the latest-wins policy.
    /// Never waits on subscriber I/O. Returns the assigned sequence number
    /// (the previous one if the hub is already closed).
    pub fn publish(&self, data: Bytes, timestamp: Duration) -> u64 {
        if self.closed.load(Ordering::Acquire) {
            return self.sequence.load(Ordering::Relaxed);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = Arc::new(Frame::new(sequence, timestamp, data));

        *self.current.lock().unwrap() = Some(Arc::clone(&frame));

        let subscribers = self.subscribers.lock().unwrap();
        for queue in subscribers.values() {
            queue.push(Arc::clone(&frame));
        }

        tracing::trace!(
            sequence = sequence,
            bytes = frame.len(),
            subscribers = subscribers.len(),
            "Frame published"
        );

        sequence
    }

    /// Register a new subscriber
    ///
    /// The subscription starts with an empty queue: frames published before
    /// the subscribe are not delivered retroactively. Dropping the returned
    /// handle unsubscribes.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let queue = Arc::new(FrameQueue::new(self.config.queue_capacity));

        {
            let mut subscribers = self.subscribers.lock().unwrap();
            if self.closed.load(Ordering::Acquire) {
                queue.close();
            } else {
                subscribers.insert(id, Arc::clone(&queue));
            }
        }

        tracing::debug!(subscription_id = id, "Subscriber added");

        Subscription {
            id,
            queue,
            hub: Arc::clone(self),
            last_sequence: 0,
        }
    }

    /// Remove a subscriber; idempotent
    fn unsubscribe(&self, id: u64) {
        let removed = self.subscribers.lock().unwrap().remove(&id);
        if let Some(queue) = removed {
            queue.close();
            tracing::debug!(subscription_id = id, "Subscriber removed");
        }
    }

    /// Mark the producer finished and wake every subscriber
    ///
    /// Queued frames remain deliverable; each subscription's `recv` returns
    /// `None` once its queue is drained. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let subscribers = self.subscribers.lock().unwrap();
        for queue in subscribers.values() {
            queue.close();
        }
        tracing::debug!(subscribers = subscribers.len(), "Hub closed");
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The most recently published frame, if any
    pub fn current_frame(&self) -> Option<Arc<Frame>> {
        self.current.lock().unwrap().clone()
    }

    /// Last assigned sequence number (0 before the first publish)
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

impl Default for FrameHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A consumer's registration with the hub
///
/// Frames arrive through [`Subscription::recv`] in strictly increasing
/// sequence order; frames may be skipped when the consumer falls behind,
/// never reordered or repeated. Dropping the handle unsubscribes.
pub struct Subscription {
    id: u64,
    queue: Arc<FrameQueue>,
    hub: Arc<FrameHub>,
    last_sequence: u64,
}

impl Subscription {
    /// Subscription id (diagnostic)
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receive the next frame
    ///
    /// Waits until a frame is available. Returns `None` once the hub has
    /// closed and the queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<Frame>> {
        let frame = self.queue.recv().await?;
        debug_assert!(frame.sequence > self.last_sequence);
        self.last_sequence = frame.sequence;
        Some(frame)
    }

    /// Sequence number of the last delivered frame (0 before the first)
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Frames this subscription missed under the latest-wins policy
    pub fn dropped_frames(&self) -> u64 {
        self.queue.dropped()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
