//! Producer and consumer entries
//!
//! Bookkeeping for the engine objects the coordinator owns.

use std::time::Instant;

use crate::engine::{ConsumerId, MediaKind, ProducerId, RtpParameters, TransportId};
use crate::session::ConnectionId;

/// The process-wide published stream
#[derive(Debug, Clone)]
pub struct ProducerEntry {
    /// Engine producer ID
    pub id: ProducerId,
    /// Publish transport carrying the stream
    pub transport_id: TransportId,
    /// Publishing connection
    pub owner: ConnectionId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    /// When the stream was published
    pub created_at: Instant,
}

/// A subscriber's receiver of the producer
#[derive(Debug, Clone)]
pub struct ConsumerEntry {
    /// Engine consumer ID
    pub id: ConsumerId,
    /// Producer this consumer depends on
    pub producer_id: ProducerId,
    /// Subscribe transport carrying the stream
    pub transport_id: TransportId,
    /// Subscribing connection
    pub owner: ConnectionId,
    pub kind: MediaKind,
    /// Whether the engine is holding media back
    pub paused: bool,
}

/// Snapshot of coordinator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Registered connections
    pub connections: usize,
    /// Transports in any state
    pub transports: usize,
    /// Whether a producer is live
    pub has_producer: bool,
    /// Live consumers
    pub consumers: usize,
}
