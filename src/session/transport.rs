//! Transport lifecycle state machine
//!
//! ```text
//!   Created ──begin_connect──► Connecting ──complete_connect──► Connected
//!      │                           │                               │
//!      └────────── fail ───────────┴──────────── fail ─────────────┴──► Failed
//!   (any) ─────────────────────────── close ───────────────────────────► Closed
//! ```
//!
//! Handshake parameters may be submitted exactly once: a resubmission is
//! `AlreadyConnecting` even after the handshake failed. Failed and Closed are
//! terminal; a peer that wants to try again creates a new transport.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::connection::ConnectionId;
use crate::engine::{ConsumerId, ProducerId, TransportId};
use crate::error::SignalError;

/// Direction of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportRole {
    /// Peer sends media (producer transport)
    Publish,
    /// Peer receives media (consumer transport)
    Subscribe,
}

impl fmt::Display for TransportRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportRole::Publish => f.write_str("publish"),
            TransportRole::Subscribe => f.write_str("subscribe"),
        }
    }
}

/// Lifecycle state of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    /// ICE/DTLS material handed to the peer
    Created,
    /// Peer submitted its DTLS parameters
    Connecting,
    /// Engine completed the handshake
    Connected,
    /// Handshake or ICE failure
    Failed,
    /// Torn down
    Closed,
}

impl TransportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransportState::Failed | TransportState::Closed)
    }
}

/// Engine object bound to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Producer(ProducerId),
    Consumer(ConsumerId),
    /// A consume call is in flight
    PendingConsumer,
}

/// One directional media transport
#[derive(Debug)]
pub struct Transport {
    /// Engine transport ID
    pub id: TransportId,

    /// Publish or subscribe
    pub role: TransportRole,

    /// Connection that created the transport
    pub owner: ConnectionId,

    /// Creation time
    pub created_at: Instant,

    /// Time the handshake completed
    pub connected_at: Option<Instant>,

    state: TransportState,
    binding: Option<Binding>,
    handshake_submitted: bool,
}

impl Transport {
    /// Create a transport in the Created state
    pub fn new(id: TransportId, role: TransportRole, owner: ConnectionId) -> Self {
        Self {
            id,
            role,
            owner,
            created_at: Instant::now(),
            connected_at: None,
            state: TransportState::Created,
            binding: None,
            handshake_submitted: false,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    /// Accept the peer's handshake parameters
    pub fn begin_connect(&mut self) -> Result<(), SignalError> {
        match self.state {
            TransportState::Closed => Err(SignalError::TransportClosed(self.id.clone())),
            _ if self.handshake_submitted => {
                Err(SignalError::AlreadyConnecting(self.id.clone()))
            }
            TransportState::Created => {
                self.state = TransportState::Connecting;
                self.handshake_submitted = true;
                Ok(())
            }
            // Failed before any parameters arrived
            _ => Err(SignalError::TransportClosed(self.id.clone())),
        }
    }

    /// Engine reported the handshake completed
    pub fn complete_connect(&mut self) -> Result<(), SignalError> {
        match self.state {
            TransportState::Connecting => {
                self.state = TransportState::Connected;
                self.connected_at = Some(Instant::now());
                Ok(())
            }
            TransportState::Created => Err(SignalError::TransportNotReady(self.id.clone())),
            TransportState::Connected => Err(SignalError::AlreadyConnecting(self.id.clone())),
            TransportState::Failed | TransportState::Closed => {
                Err(SignalError::TransportClosed(self.id.clone()))
            }
        }
    }

    /// Move to Failed, returning whatever was bound
    ///
    /// No-op (returns None) once terminal.
    pub fn fail(&mut self) -> Option<Binding> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = TransportState::Failed;
        self.binding.take()
    }

    /// Move to Closed, returning whatever was bound
    pub fn close(&mut self) -> Option<Binding> {
        self.state = TransportState::Closed;
        self.binding.take()
    }

    /// Check the transport can carry media for `role`
    pub fn require_ready(&self, role: TransportRole) -> Result<(), SignalError> {
        if self.role != role {
            return Err(SignalError::WrongRole {
                transport: self.id.clone(),
                expected: role,
            });
        }
        match self.state {
            TransportState::Connected => Ok(()),
            TransportState::Created | TransportState::Connecting => {
                Err(SignalError::TransportNotReady(self.id.clone()))
            }
            TransportState::Failed | TransportState::Closed => {
                Err(SignalError::TransportClosed(self.id.clone()))
            }
        }
    }

    /// Bind a producer, returning the one it replaces
    pub fn bind_producer(&mut self, producer: ProducerId) -> Result<Option<ProducerId>, SignalError> {
        self.require_ready(TransportRole::Publish)?;
        let previous = match self.binding.replace(Binding::Producer(producer)) {
            Some(Binding::Producer(previous)) => Some(previous),
            _ => None,
        };
        Ok(previous)
    }

    /// Claim the transport for a consume call
    pub fn reserve_consumer(&mut self) -> Result<(), SignalError> {
        self.require_ready(TransportRole::Subscribe)?;
        if self.binding.is_some() {
            return Err(SignalError::AlreadyConsuming(self.id.clone()));
        }
        self.binding = Some(Binding::PendingConsumer);
        Ok(())
    }

    /// Replace the reservation with the consumer the engine created
    pub fn bind_consumer(&mut self, consumer: ConsumerId) -> Result<(), SignalError> {
        self.require_ready(TransportRole::Subscribe)?;
        match self.binding {
            Some(Binding::PendingConsumer) => {
                self.binding = Some(Binding::Consumer(consumer));
                Ok(())
            }
            Some(_) => Err(SignalError::AlreadyConsuming(self.id.clone())),
            None => Err(SignalError::TransportNotReady(self.id.clone())),
        }
    }

    /// Drop a consume reservation that did not complete
    pub fn release_reservation(&mut self) {
        if self.binding == Some(Binding::PendingConsumer) {
            self.binding = None;
        }
    }

    /// Clear the binding if it is exactly `binding`
    pub fn unbind(&mut self, binding: &Binding) -> bool {
        if self.binding.as_ref() == Some(binding) {
            self.binding = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(role: TransportRole) -> Transport {
        Transport::new(TransportId::new("t-1"), role, ConnectionId(1))
    }

    fn connected(role: TransportRole) -> Transport {
        let mut t = transport(role);
        t.begin_connect().unwrap();
        t.complete_connect().unwrap();
        t
    }

    #[test]
    fn test_transport_lifecycle() {
        let mut t = transport(TransportRole::Publish);
        assert_eq!(t.state(), TransportState::Created);

        t.begin_connect().unwrap();
        assert_eq!(t.state(), TransportState::Connecting);

        t.complete_connect().unwrap();
        assert_eq!(t.state(), TransportState::Connected);
        assert!(t.connected_at.is_some());

        assert_eq!(t.close(), None);
        assert_eq!(t.state(), TransportState::Closed);
    }

    #[test]
    fn test_connect_is_one_shot() {
        let mut t = transport(TransportRole::Subscribe);
        t.begin_connect().unwrap();

        assert_eq!(
            t.begin_connect(),
            Err(SignalError::AlreadyConnecting(t.id.clone()))
        );
        t.complete_connect().unwrap();
        assert_eq!(
            t.begin_connect(),
            Err(SignalError::AlreadyConnecting(t.id.clone()))
        );
    }

    #[test]
    fn test_terminal_states() {
        let mut t = connected(TransportRole::Subscribe);
        t.reserve_consumer().unwrap();
        t.bind_consumer(ConsumerId::new("c-1")).unwrap();

        assert_eq!(t.fail(), Some(Binding::Consumer(ConsumerId::new("c-1"))));
        assert_eq!(t.state(), TransportState::Failed);
        assert_eq!(t.fail(), None);
        assert!(matches!(
            t.require_ready(TransportRole::Subscribe),
            Err(SignalError::TransportClosed(_))
        ));

        let mut t = transport(TransportRole::Subscribe);
        t.fail();
        assert!(matches!(
            t.begin_connect(),
            Err(SignalError::TransportClosed(_))
        ));

        let mut t = connected(TransportRole::Publish);
        t.close();
        assert!(matches!(
            t.begin_connect(),
            Err(SignalError::TransportClosed(_))
        ));
    }

    #[test]
    fn test_reconnect_after_failed_handshake() {
        let mut t = transport(TransportRole::Publish);
        t.begin_connect().unwrap();
        t.fail();
        assert_eq!(t.state(), TransportState::Failed);

        assert_eq!(
            t.begin_connect(),
            Err(SignalError::AlreadyConnecting(t.id.clone()))
        );

        let mut t = connected(TransportRole::Subscribe);
        t.fail();
        assert_eq!(
            t.begin_connect(),
            Err(SignalError::AlreadyConnecting(t.id.clone()))
        );
    }

    #[test]
    fn test_require_ready() {
        let t = transport(TransportRole::Publish);
        assert!(matches!(
            t.require_ready(TransportRole::Publish),
            Err(SignalError::TransportNotReady(_))
        ));

        let t = connected(TransportRole::Publish);
        assert!(t.require_ready(TransportRole::Publish).is_ok());
        assert!(matches!(
            t.require_ready(TransportRole::Subscribe),
            Err(SignalError::WrongRole {
                expected: TransportRole::Subscribe,
                ..
            })
        ));
    }

    #[test]
    fn test_single_consumer_per_transport() {
        let mut t = connected(TransportRole::Subscribe);

        t.reserve_consumer().unwrap();
        assert!(matches!(
            t.reserve_consumer(),
            Err(SignalError::AlreadyConsuming(_))
        ));

        t.release_reservation();
        t.reserve_consumer().unwrap();
        t.bind_consumer(ConsumerId::new("c-1")).unwrap();
        assert!(matches!(
            t.reserve_consumer(),
            Err(SignalError::AlreadyConsuming(_))
        ));
    }

    #[test]
    fn test_producer_rebind_returns_previous() {
        let mut t = connected(TransportRole::Publish);

        assert_eq!(t.bind_producer(ProducerId::new("p-1")).unwrap(), None);
        assert_eq!(
            t.bind_producer(ProducerId::new("p-2")).unwrap(),
            Some(ProducerId::new("p-1"))
        );
        assert!(t.unbind(&Binding::Producer(ProducerId::new("p-2"))));
        assert_eq!(t.binding(), None);
    }
}
