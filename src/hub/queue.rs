//! Per-subscriber delivery queue
//!
//! Each subscription owns one `FrameQueue`: a bounded FIFO with a
//! latest-wins overflow policy. `push` runs on the publisher's path and
//! must never wait on the consumer, so the queue is a plain mutex-guarded
//! deque with short critical sections and a `Notify` for the consumer's
//! wakeup. When a push would exceed capacity, the oldest queued frame is
//! dropped and counted; the publisher is never blocked and the queue never
//! grows past its capacity.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::Notify;

use super::frame::Frame;

#[derive(Debug)]
pub(crate) struct FrameQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

#[derive(Debug)]
struct QueueInner {
    frames: VecDeque<Arc<Frame>>,
    dropped: u64,
    closed: bool,
}

impl FrameQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                frames: VecDeque::with_capacity(capacity),
                dropped: 0,
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue a frame, dropping the oldest queued frame on overflow
    ///
    /// Never blocks beyond the mutex. A push to a closed queue is a no-op.
    pub(crate) fn push(&self, frame: Arc<Frame>) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.closed {
                return;
            }
            if inner.frames.len() == self.capacity {
                inner.frames.pop_front();
                inner.dropped += 1;
            }
            inner.frames.push_back(frame);
        }
        self.notify.notify_one();
    }

    /// Mark the queue closed and wake the consumer
    ///
    /// Already-queued frames remain receivable; `recv` returns `None` once
    /// the queue is drained.
    pub(crate) fn close(&self) {
        self.inner.lock().unwrap().closed = true;
        self.notify.notify_one();
    }

    /// Receive the next frame, waiting until one arrives or the queue closes
    pub(crate) async fn recv(&self) -> Option<Arc<Frame>> {
        loop {
            {
                let mut inner = self.inner.lock().unwrap();
                if let Some(frame) = inner.frames.pop_front() {
                    return Some(frame);
                }
                if inner.closed {
                    return None;
                }
            }
            // A push between the unlock above and this await leaves a
            // stored permit, so the wakeup cannot be lost.
            self.notify.notified().await;
        }
    }

    /// Frames discarded by the latest-wins policy so far
    pub(crate) fn dropped(&self) -> u64 {
        self.inner.lock().unwrap().dropped
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().frames.len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    fn frame(sequence: u64) -> Arc<Frame> {
        Arc::new(Frame::new(
            sequence,
            Duration::from_millis(sequence * 33),
            Bytes::from_static(b"\xff\xd8\xff\xd9"),
        ))
    }

    #[tokio::test]
    async fn test_push_recv() {
        let queue = FrameQueue::new(2);
        queue.push(frame(1));

        let received = queue.recv().await.unwrap();
        assert_eq!(received.sequence, 1);
    }

    #[tokio::test]
    async fn test_latest_wins_drops_oldest() {
        let queue = FrameQueue::new(2);
        queue.push(frame(1));
        queue.push(frame(2));
        queue.push(frame(3)); // overflows, frame 1 dropped

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.recv().await.unwrap().sequence, 2);
        assert_eq!(queue.recv().await.unwrap().sequence, 3);
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = FrameQueue::new(2);
        queue.push(frame(1));
        queue.close();

        assert_eq!(queue.recv().await.unwrap().sequence, 1);
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_push_after_close_ignored() {
        let queue = FrameQueue::new(2);
        queue.close();
        queue.push(frame(1));

        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        let queue = Arc::new(FrameQueue::new(2));

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.recv().await })
        };

        // Give the waiter a chance to park before pushing
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(frame(7));

        let received = waiter.await.unwrap().unwrap();
        assert_eq!(received.sequence, 7);
    }
}
