//! Per-connection event loop
//!
//! A connection is driven over a pair of frame channels, so the same loop
//! serves WebSocket peers and in-process peers.
//!
//! ```text
//!   inbound ──► decode ──► spawn(dispatch) ──► ack ──────────┐
//!                                                            ├──► outbound
//!   coordinator ──► notification sink ──► event frame ───────┘
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::dispatch::dispatch;
use crate::coordinator::SessionCoordinator;
use crate::engine::MediaEngine;
use crate::error::SignalError;
use crate::protocol::{AckEnvelope, ErrorBody, EventEnvelope, Frame, Notification, Request, Response};
use crate::session::ConnectionId;

/// One registered peer
pub struct Connection<E: MediaEngine> {
    id: ConnectionId,
    coordinator: Arc<SessionCoordinator<E>>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    opened_at: Instant,
}

impl<E: MediaEngine> Connection<E> {
    /// Register a peer with the coordinator
    ///
    /// Any catch-up notification is queued before this returns.
    pub async fn open(
        id: ConnectionId,
        peer_addr: Option<SocketAddr>,
        coordinator: Arc<SessionCoordinator<E>>,
    ) -> Result<Self, SignalError> {
        let (sink, notifications) = mpsc::unbounded_channel();
        coordinator.register_connection(id, peer_addr, sink).await?;

        Ok(Self {
            id,
            coordinator,
            notifications,
            opened_at: Instant::now(),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Serve the peer until its inbound channel closes
    ///
    /// Requests run concurrently, each in its own task. Requests still in
    /// flight when the peer leaves are left to finish; the coordinator
    /// releases whatever they create for a connection that no longer exists.
    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<Frame>,
        outbound: mpsc::UnboundedSender<Frame>,
    ) {
        loop {
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(Frame::Event(envelope)) => self.handle_event(envelope, &outbound),
                    Some(Frame::Ack(ack)) => {
                        tracing::debug!(
                            connection_id = self.id.0,
                            ack = ack.ack,
                            "Ignoring acknowledgement from peer"
                        );
                    }
                    None => break,
                },
                Some(notification) = self.notifications.recv() => {
                    if !self.forward(notification, &outbound) {
                        break;
                    }
                }
            }
        }

        self.coordinator.on_disconnect(self.id).await;

        tracing::debug!(
            connection_id = self.id.0,
            duration_ms = self.opened_at.elapsed().as_millis() as u64,
            "Connection loop finished"
        );
    }

    fn handle_event(&self, envelope: EventEnvelope, outbound: &mpsc::UnboundedSender<Frame>) {
        let EventEnvelope { event, data, ack } = envelope;

        let request = match Request::decode(&event, data) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    connection_id = self.id.0,
                    event = %event,
                    error = %e,
                    "Rejected request"
                );
                if let Some(ack) = ack {
                    let _ = outbound.send(Frame::Ack(AckEnvelope::failure(ack, ErrorBody::from(&e))));
                }
                return;
            }
        };

        tracing::debug!(
            connection_id = self.id.0,
            event = request.event_name(),
            ack = ?ack,
            "Request received"
        );

        let conn = self.id;
        let coordinator = Arc::clone(&self.coordinator);
        let outbound = outbound.clone();

        tokio::spawn(async move {
            let event = request.event_name();
            let result = dispatch(&coordinator, conn, request).await;

            if let Err(e) = &result {
                tracing::warn!(
                    connection_id = conn.0,
                    event = event,
                    code = e.code(),
                    error = %e,
                    "Request failed"
                );
            }

            match ack {
                Some(ack) => {
                    let _ = outbound.send(Frame::Ack(acknowledge(ack, result)));
                }
                None => tracing::trace!(connection_id = conn.0, event = event, "No ack requested"),
            }
        });
    }

    /// Send a notification as an event frame; false once the peer is gone
    fn forward(&self, notification: Notification, outbound: &mpsc::UnboundedSender<Frame>) -> bool {
        let (event, data) = match notification.encode() {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode notification");
                return true;
            }
        };

        tracing::debug!(connection_id = self.id.0, event = event, "Notifying peer");
        outbound
            .send(Frame::Event(EventEnvelope::notify(event, data)))
            .is_ok()
    }
}

/// Build the acknowledgement for a finished request
pub fn acknowledge(ack: u64, result: Result<Response, SignalError>) -> AckEnvelope {
    match result.map(Response::into_value) {
        Ok(Ok(data)) => AckEnvelope::success(ack, data),
        Ok(Err(e)) => AckEnvelope::failure(ack, ErrorBody::from(&e)),
        Err(e) => AckEnvelope::failure(ack, ErrorBody::from(&e)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::engine::{MediaEngineConfig, MemoryEngine};
    use crate::protocol::constants::error_codes;

    async fn open() -> (
        mpsc::UnboundedSender<Frame>,
        mpsc::UnboundedReceiver<Frame>,
        tokio::task::JoinHandle<()>,
        Arc<SessionCoordinator<MemoryEngine>>,
    ) {
        let coordinator =
            SessionCoordinator::start(Arc::new(MemoryEngine::new()), MediaEngineConfig::default())
                .await
                .unwrap();
        let connection = Connection::open(ConnectionId(1), None, Arc::clone(&coordinator))
            .await
            .unwrap();

        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(connection.run(in_rx, out_tx));
        (in_tx, out_rx, handle, coordinator)
    }

    async fn next_ack(rx: &mut mpsc::UnboundedReceiver<Frame>) -> AckEnvelope {
        loop {
            match rx.recv().await.unwrap() {
                Frame::Ack(ack) => return ack,
                Frame::Event(_) => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_request_gets_matching_ack() {
        let (tx, mut rx, _handle, _coordinator) = open().await;

        tx.send(Frame::Event(EventEnvelope::request(
            "getRouterRtpCapabilities",
            Value::Null,
            9,
        )))
        .unwrap();

        let ack = next_ack(&mut rx).await;
        assert_eq!(ack.ack, 9);
        assert!(ack.error.is_none());
        assert_eq!(ack.data.unwrap()["codecs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_event_is_rejected() {
        let (tx, mut rx, _handle, _coordinator) = open().await;

        tx.send(Frame::Event(EventEnvelope::request("teleport", Value::Null, 1)))
            .unwrap();

        let ack = next_ack(&mut rx).await;
        assert_eq!(ack.error.unwrap().code, error_codes::UNKNOWN_EVENT);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected() {
        let (tx, mut rx, _handle, _coordinator) = open().await;

        tx.send(Frame::Event(EventEnvelope::request(
            "produce",
            json!({ "kind": "smell" }),
            2,
        )))
        .unwrap();

        let ack = next_ack(&mut rx).await;
        assert_eq!(ack.ack, 2);
        assert_eq!(ack.error.unwrap().code, error_codes::INVALID_PAYLOAD);
    }

    #[tokio::test]
    async fn test_coordinator_error_is_rejected() {
        let (tx, mut rx, _handle, _coordinator) = open().await;

        tx.send(Frame::Event(EventEnvelope::request("consume", json!({}), 3)))
            .unwrap();

        let ack = next_ack(&mut rx).await;
        assert_eq!(ack.error.unwrap().code, error_codes::NO_PRODUCER);
    }

    #[tokio::test]
    async fn test_closing_inbound_disconnects() {
        let (tx, _rx, handle, coordinator) = open().await;
        assert_eq!(coordinator.connection_count().await, 1);

        drop(tx);
        handle.await.unwrap();

        assert_eq!(coordinator.connection_count().await, 0);
    }

    #[test]
    fn test_acknowledge_shapes() {
        let ok = acknowledge(4, Ok(Response::Connected));
        assert_eq!(ok.data, Some(json!({})));

        let err = acknowledge(5, Err(SignalError::NoProducer));
        assert_eq!(err.ack, 5);
        assert_eq!(err.error.unwrap().code, error_codes::NO_PRODUCER);
    }
}
