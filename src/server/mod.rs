//! Signaling server
//!
//! Accepts WebSocket peers on one path and runs a connection loop per peer
//! against the shared coordinator.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use dispatch::dispatch;
pub use listener::{LocalConnection, SignalServer};
