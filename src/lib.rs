//! Signaling coordinator for a single-producer SFU
//!
//! Peers talk to the coordinator over a named-event channel. One peer
//! publishes a media stream; any number of others subscribe to it. The
//! coordinator drives the media engine through the [`engine::MediaEngine`]
//! trait and never touches media itself.
//!
//! # Modules
//!
//! - [`rpc`]: request/acknowledgement calls over fire-and-forget events
//! - [`capabilities`]: one-shot engine startup and router capabilities
//! - [`session`]: transport lifecycle and per-peer connection state
//! - [`coordinator`]: producer slot, transports, consumers, notifications
//! - [`server`]: WebSocket endpoint and per-connection event loop
//! - [`client`]: typed peer-side API
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sfu_signal::engine::MemoryEngine;
//! use sfu_signal::server::{ServerConfig, SignalServer};
//!
//! # async fn example() -> sfu_signal::error::Result<()> {
//! let server = SignalServer::start(ServerConfig::default(), Arc::new(MemoryEngine::new())).await?;
//! server.run().await
//! # }
//! ```

pub mod capabilities;
pub mod client;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod rpc;
pub mod server;
pub mod session;

pub use capabilities::CapabilityRegistry;
pub use client::SignalClient;
pub use coordinator::SessionCoordinator;
pub use engine::{MediaEngine, MediaEngineConfig, MemoryEngine};
pub use error::{Error, Result};
pub use server::{ServerConfig, SignalServer};
