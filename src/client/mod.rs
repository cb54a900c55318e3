//! Signaling client implementation
//!
//! Provides the peer side of the signaling protocol for:
//! - Driving the publish and subscribe flows against a server
//! - Tests and demos that talk to an in-process server

pub mod signal;

pub use signal::SignalClient;
