//! Per-connection session state
//!
//! Types describing one viewer's connection lifecycle. The driving logic
//! lives in [`crate::server::connection`]; this module holds the state
//! machine it steps through.

pub mod state;

pub use state::{SessionPhase, SessionState};
