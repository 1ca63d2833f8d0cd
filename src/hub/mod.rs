//! Frame hub: single-producer fan-out to many subscribers
//!
//! The hub receives JPEG frames from the source adapter and republishes
//! each one to every subscribed client session without ever blocking on a
//! subscriber.
//!
//! # Architecture
//!
//! ```text
//!                            Arc<FrameHub>
//!                   ┌──────────────────────────────┐
//!                   │ current: Arc<Frame>          │
//!                   │ subscribers: HashMap<Id,     │
//!                   │   Arc<FrameQueue>  (cap 2,   │
//!                   │       latest-wins)           │
//!                   │ >                            │
//!                   └──────────────┬───────────────┘
//!                                  │
//!            ┌─────────────────────┼─────────────────────┐
//!            │                     │                     │
//!            ▼                     ▼                     ▼
//!       [Producer]           [Subscriber]          [Subscriber]
//!       hub.publish()        sub.recv()            sub.recv()
//!            │                     │                     │
//!            └──► queue.push() ──► multipart part ──► TCP
//! ```
//!
//! # Backpressure
//!
//! Every subscription has its own bounded queue. When a publish would
//! overflow a slow subscriber's queue, that subscriber's oldest queued
//! frame is dropped and replaced: the publisher never blocks and memory
//! stays bounded regardless of how many clients stall. A stalled client
//! only ever misses frames; it cannot delay the producer or its peers.
//!
//! # Zero-Copy Design
//!
//! Payloads are `bytes::Bytes`, so the `Arc<Frame>` handed to N
//! subscribers shares one allocation; fan-out clones reference counts,
//! never JPEG data.

pub mod config;
pub mod frame;
mod queue;
pub mod store;

pub use config::HubConfig;
pub use frame::Frame;
pub use store::{FrameHub, Subscription};
