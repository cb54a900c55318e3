//! Notification fan-out
//!
//! Each registered connection has an unbounded sink for one-way
//! notifications. Delivery is best effort: a sink whose receiver is gone is
//! skipped and the connection is expected to be torn down by its own event
//! loop shortly after.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::protocol::Notification;
use crate::session::ConnectionId;

/// Outbound notification channel of one connection
pub type NotificationSink = mpsc::UnboundedSender<Notification>;

/// Per-connection notification sinks
#[derive(Debug, Default)]
pub struct Broadcaster {
    sinks: HashMap<ConnectionId, NotificationSink>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, conn: ConnectionId, sink: NotificationSink) {
        self.sinks.insert(conn, sink);
    }

    pub fn unregister(&mut self, conn: ConnectionId) {
        self.sinks.remove(&conn);
    }

    /// Send one notification to one connection
    pub fn notify(&self, conn: ConnectionId, notification: Notification) -> bool {
        match self.sinks.get(&conn) {
            Some(sink) => sink.send(notification).is_ok(),
            None => false,
        }
    }

    /// Tell every live connection except `origin` that a producer exists
    ///
    /// Returns the number of connections the notification was delivered to.
    pub fn announce_publisher_available(&self, origin: ConnectionId) -> usize {
        self.sinks
            .iter()
            .filter(|(conn, _)| **conn != origin)
            .filter(|(_, sink)| sink.send(Notification::NewProducer).is_ok())
            .count()
    }

    /// Catch-up for a connection that registered after the announcement
    pub fn announce_to(&self, conn: ConnectionId) -> bool {
        self.notify(conn, Notification::NewProducer)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announce_skips_origin() {
        let mut broadcaster = Broadcaster::new();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let (c_tx, mut c_rx) = mpsc::unbounded_channel();
        broadcaster.register(ConnectionId(1), a_tx);
        broadcaster.register(ConnectionId(2), b_tx);
        broadcaster.register(ConnectionId(3), c_tx);

        assert_eq!(broadcaster.announce_publisher_available(ConnectionId(1)), 2);

        assert!(a_rx.try_recv().is_err());
        assert_eq!(b_rx.try_recv().unwrap(), Notification::NewProducer);
        assert_eq!(c_rx.try_recv().unwrap(), Notification::NewProducer);
        assert!(b_rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_sink_is_skipped() {
        let mut broadcaster = Broadcaster::new();
        let (a_tx, _a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        broadcaster.register(ConnectionId(1), a_tx);
        broadcaster.register(ConnectionId(2), b_tx);
        drop(b_rx);

        assert_eq!(broadcaster.announce_publisher_available(ConnectionId(3)), 1);
        assert!(!broadcaster.announce_to(ConnectionId(2)));
    }

    #[test]
    fn test_unregistered_connection_gets_nothing() {
        let mut broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register(ConnectionId(1), tx);
        broadcaster.unregister(ConnectionId(1));

        assert!(broadcaster.is_empty());
        assert!(!broadcaster.announce_to(ConnectionId(1)));
        assert!(rx.try_recv().is_err());
    }
}
