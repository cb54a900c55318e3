//! Per-connection signaling state
//!
//! Tracks which transports a peer created and the device capabilities it
//! declared, from registration until disconnect.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use super::transport::TransportRole;
use crate::engine::{RtpCapabilities, TransportId};

/// Unique connection ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One peer's signaling session
#[derive(Debug)]
pub struct ConnectionState {
    /// Unique connection ID
    pub id: ConnectionId,

    /// Remote peer address (None for in-process peers)
    pub peer_addr: Option<SocketAddr>,

    /// Registration time
    pub connected_at: Instant,

    /// Capabilities the peer's device declared when creating a transport
    pub device_capabilities: Option<RtpCapabilities>,

    /// Publish transports, oldest first
    publish_transports: Vec<TransportId>,

    /// Subscribe transports, oldest first
    subscribe_transports: Vec<TransportId>,
}

impl ConnectionState {
    pub fn new(id: ConnectionId, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer_addr,
            connected_at: Instant::now(),
            device_capabilities: None,
            publish_transports: Vec::new(),
            subscribe_transports: Vec::new(),
        }
    }

    /// Record a transport created for this connection
    pub fn track_transport(&mut self, role: TransportRole, id: TransportId) {
        match role {
            TransportRole::Publish => self.publish_transports.push(id),
            TransportRole::Subscribe => self.subscribe_transports.push(id),
        }
    }

    /// Most recently created transport of `role`
    pub fn latest_transport(&self, role: TransportRole) -> Option<&TransportId> {
        match role {
            TransportRole::Publish => self.publish_transports.last(),
            TransportRole::Subscribe => self.subscribe_transports.last(),
        }
    }

    /// All transports, publish first
    pub fn transports(&self) -> impl Iterator<Item = &TransportId> {
        self.publish_transports
            .iter()
            .chain(self.subscribe_transports.iter())
    }

    pub fn transport_count(&self) -> usize {
        self.publish_transports.len() + self.subscribe_transports.len()
    }

    /// Get connection duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_transport_per_role() {
        let mut conn = ConnectionState::new(ConnectionId(7), None);
        assert!(conn.latest_transport(TransportRole::Publish).is_none());

        conn.track_transport(TransportRole::Publish, TransportId::new("p-1"));
        conn.track_transport(TransportRole::Subscribe, TransportId::new("s-1"));
        conn.track_transport(TransportRole::Publish, TransportId::new("p-2"));

        assert_eq!(
            conn.latest_transport(TransportRole::Publish),
            Some(&TransportId::new("p-2"))
        );
        assert_eq!(
            conn.latest_transport(TransportRole::Subscribe),
            Some(&TransportId::new("s-1"))
        );
        assert_eq!(conn.transport_count(), 3);
        assert_eq!(conn.transports().count(), 3);
    }
}
