//! Statistics and metrics

pub mod metrics;

pub use metrics::{ServerStats, StatusSnapshot, ViewerGuard};
