//! Per-peer session state
//!
//! Each connection owns a set of directional transports; each transport runs
//! through its own lifecycle independently of the others.

pub mod connection;
pub mod transport;

pub use connection::{ConnectionId, ConnectionState};
pub use transport::{Binding, Transport, TransportRole, TransportState};
