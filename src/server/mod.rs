//! HTTP streaming server
//!
//! The listener accepts connections and hands each one to a connection
//! task; the connection drives the session state machine and, for stream
//! requests, the multipart delivery loop against the hub.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::StreamServer;
