//! Request/response over a fire-and-forget event channel
//!
//! The channel only knows how to emit named events. [`RpcClient::call`] turns
//! an emit into a call: it tags the event with a fresh correlation id, parks a
//! continuation under that id and suspends until the matching acknowledgement
//! is fed back through [`RpcClient::handle_ack`].
//!
//! ```text
//!   call("produce", data) ──► pending[7] = tx ──► sink: {"event":"produce","ack":7}
//!                                                          │
//!   resolves ◄────────── pending.remove(7) ◄── handle_ack({"ack":7,...})
//! ```
//!
//! Matching by id means several calls can be outstanding on one channel and
//! acknowledgements may arrive in any order. There is no timeout and no retry:
//! a call whose acknowledgement never arrives stays pending until
//! [`RpcClient::close`] abandons it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::ProtocolError;
use crate::protocol::{AckEnvelope, EventEnvelope, Frame};

/// Outbound half of an event channel
pub trait EventSink: Send + Sync {
    fn send_frame(&self, frame: Frame) -> Result<(), ProtocolError>;
}

impl EventSink for mpsc::UnboundedSender<Frame> {
    fn send_frame(&self, frame: Frame) -> Result<(), ProtocolError> {
        self.send(frame).map_err(|_| ProtocolError::ChannelClosed)
    }
}

type Reply = oneshot::Sender<Result<Value, ProtocolError>>;

#[derive(Default)]
struct PendingCalls {
    calls: HashMap<u64, Reply>,
    closed: bool,
}

/// Call issuer for one event channel
pub struct RpcClient<S: EventSink> {
    sink: S,
    next_ack: AtomicU64,
    pending: Mutex<PendingCalls>,
}

impl<S: EventSink> RpcClient<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            next_ack: AtomicU64::new(1),
            pending: Mutex::new(PendingCalls::default()),
        }
    }

    /// Emit `event` and wait for its acknowledgement
    pub async fn call(&self, event: &str, data: Value) -> Result<Value, ProtocolError> {
        let ack = self.next_ack.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock();
            if pending.closed {
                return Err(ProtocolError::ChannelClosed);
            }
            pending.calls.insert(ack, tx);
        }

        if let Err(e) = self
            .sink
            .send_frame(Frame::Event(EventEnvelope::request(event, data, ack)))
        {
            self.pending.lock().calls.remove(&ack);
            return Err(e);
        }

        tracing::trace!(event = event, ack = ack, "Call issued");

        // Sender dropped: the channel was closed while we waited
        rx.await.map_err(|_| ProtocolError::ChannelClosed)?
    }

    /// Emit a one-way event
    pub fn emit(&self, event: &str, data: Value) -> Result<(), ProtocolError> {
        self.sink
            .send_frame(Frame::Event(EventEnvelope::notify(event, data)))
    }

    /// Resolve the call an acknowledgement belongs to
    ///
    /// Returns false for ids with no pending call (duplicate or late
    /// acknowledgements), which are dropped.
    pub fn handle_ack(&self, ack: AckEnvelope) -> bool {
        let reply = self.pending.lock().calls.remove(&ack.ack);
        match reply {
            Some(reply) => {
                let _ = reply.send(ack.into_result());
                true
            }
            None => {
                tracing::warn!(ack = ack.ack, "Acknowledgement for unknown call");
                false
            }
        }
    }

    /// Abandon every pending call; later calls fail immediately
    pub fn close(&self) {
        let mut pending = self.pending.lock();
        pending.closed = true;
        let abandoned = pending.calls.len();
        pending.calls.clear();

        if abandoned > 0 {
            tracing::debug!(abandoned = abandoned, "Pending calls abandoned");
        }
    }

    /// Number of calls waiting for an acknowledgement
    pub fn pending_count(&self) -> usize {
        self.pending.lock().calls.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;

    fn client() -> (Arc<RpcClient<mpsc::UnboundedSender<Frame>>>, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(RpcClient::new(tx)), rx)
    }

    async fn next_request(rx: &mut mpsc::UnboundedReceiver<Frame>) -> EventEnvelope {
        match rx.recv().await.unwrap() {
            Frame::Event(env) => env,
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_call_resolves_with_ack() {
        let (rpc, mut rx) = client();

        let caller = {
            let rpc = Arc::clone(&rpc);
            tokio::spawn(async move { rpc.call("produce", json!({ "kind": "video" })).await })
        };

        let request = next_request(&mut rx).await;
        assert_eq!(request.event, "produce");
        let ack = request.ack.unwrap();

        assert!(rpc.handle_ack(AckEnvelope::success(ack, json!({ "id": "p-1" }))));
        assert_eq!(caller.await.unwrap().unwrap(), json!({ "id": "p-1" }));
        assert_eq!(rpc.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_out_of_order_acks() {
        let (rpc, mut rx) = client();

        let first = {
            let rpc = Arc::clone(&rpc);
            tokio::spawn(async move { rpc.call("first", Value::Null).await })
        };
        let first_ack = next_request(&mut rx).await.ack.unwrap();

        let second = {
            let rpc = Arc::clone(&rpc);
            tokio::spawn(async move { rpc.call("second", Value::Null).await })
        };
        let second_ack = next_request(&mut rx).await.ack.unwrap();
        assert_ne!(first_ack, second_ack);

        rpc.handle_ack(AckEnvelope::success(second_ack, json!("two")));
        rpc.handle_ack(AckEnvelope::success(first_ack, json!("one")));

        assert_eq!(first.await.unwrap().unwrap(), json!("one"));
        assert_eq!(second.await.unwrap().unwrap(), json!("two"));
    }

    #[tokio::test]
    async fn test_rejection_surfaces_code() {
        let (rpc, mut rx) = client();

        let caller = {
            let rpc = Arc::clone(&rpc);
            tokio::spawn(async move { rpc.call("consume", Value::Null).await })
        };
        let ack = next_request(&mut rx).await.ack.unwrap();
        rpc.handle_ack(AckEnvelope::failure(
            ack,
            crate::protocol::ErrorBody {
                code: "NO_PRODUCER".into(),
                message: "No producer available".into(),
            },
        ));

        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err.code(), "NO_PRODUCER");
    }

    #[tokio::test]
    async fn test_close_abandons_pending() {
        let (rpc, mut rx) = client();

        let caller = {
            let rpc = Arc::clone(&rpc);
            tokio::spawn(async move { rpc.call("connectProducerTransport", Value::Null).await })
        };
        let _ = next_request(&mut rx).await;
        assert_eq!(rpc.pending_count(), 1);

        rpc.close();

        assert_eq!(caller.await.unwrap(), Err(ProtocolError::ChannelClosed));
        assert_eq!(
            rpc.call("produce", Value::Null).await,
            Err(ProtocolError::ChannelClosed)
        );
    }

    #[tokio::test]
    async fn test_emit_carries_no_ack() {
        let (rpc, mut rx) = client();

        rpc.emit("resume", json!({})).unwrap();

        let event = next_request(&mut rx).await;
        assert_eq!(event.event, "resume");
        assert_eq!(event.ack, None);
        assert_eq!(rpc.pending_count(), 0);

        drop(rx);
        assert_eq!(
            rpc.emit("resume", Value::Null),
            Err(ProtocolError::ChannelClosed)
        );
    }

    #[tokio::test]
    async fn test_unknown_ack_is_dropped() {
        let (rpc, _rx) = client();
        assert!(!rpc.handle_ack(AckEnvelope::success(42, Value::Null)));
    }

    #[tokio::test]
    async fn test_send_failure_clears_pending() {
        let (rpc, rx) = client();
        drop(rx);

        assert_eq!(
            rpc.call("resume", Value::Null).await,
            Err(ProtocolError::ChannelClosed)
        );
        assert_eq!(rpc.pending_count(), 0);
    }
}
