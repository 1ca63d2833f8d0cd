//! # mjpeg-rs
//!
//! MJPEG-over-HTTP streaming server library: bridges one JPEG frame
//! producer (a camera capture/encode pipeline, or anything implementing
//! [`source::FrameSource`]) to any number of concurrent HTTP viewers via
//! `multipart/x-mixed-replace`.
//!
//! # Architecture
//!
//! ```text
//! [FrameSource] ──bounded channel──► [SourceAdapter] ──publish──► [FrameHub]
//!                                                                     │
//!                                          per-subscriber queues ─────┤
//!                                          (bounded, latest-wins)     │
//!                                                                     ▼
//! [StreamServer] ──accept──► [Connection/Session] ──recv──► multipart ──► TCP
//! ```
//!
//! The hub guarantees a slow or stalled viewer can never block the
//! producer or another viewer: each subscription has its own small
//! bounded queue, and overflow drops that subscriber's oldest frame.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mjpeg_rs::hub::FrameHub;
//! use mjpeg_rs::source::{PatternSource, SourceAdapter, SourceConfig};
//! use mjpeg_rs::{ServerConfig, StreamServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = Arc::new(FrameHub::new());
//!
//!     let adapter = SourceAdapter::new(
//!         Arc::new(PatternSource::new()),
//!         SourceConfig::default().fps(15),
//!         Arc::clone(&hub),
//!     );
//!     adapter.start()?;
//!
//!     let server = StreamServer::new(ServerConfig::default(), hub);
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!
//!     adapter.stop();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod http;
pub mod hub;
pub mod server;
pub mod session;
pub mod source;
pub mod stats;

pub use error::{Error, Result};
pub use server::{ServerConfig, StreamServer};
