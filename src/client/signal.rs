//! Signaling client
//!
//! Peer-side API: one typed call per request, plus the stream of
//! notifications the coordinator pushes.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::engine::{
    DtlsParameters, MediaKind, ProducerId, RtpCapabilities, RtpParameters, TransportId,
    TransportParams,
};
use crate::error::{ProtocolError, Result};
use crate::protocol::{
    ConnectTransportRequest, ConsumeRequest, ConsumerDescriptor, CreateTransportRequest, Frame,
    Notification, ProduceRequest, ProducedResponse, Request,
};
use crate::rpc::RpcClient;
use crate::server::LocalConnection;

/// Signaling client
///
/// # Example
/// ```no_run
/// use sfu_signal::client::SignalClient;
/// use sfu_signal::protocol::CreateTransportRequest;
///
/// # async fn example() -> sfu_signal::error::Result<()> {
/// let (client, mut notifications) = SignalClient::connect("ws://localhost:3000/server").await?;
///
/// tokio::spawn(async move {
///     while let Some(notification) = notifications.recv().await {
///         println!("Notification: {:?}", notification);
///     }
/// });
///
/// let caps = client.get_router_rtp_capabilities().await?;
/// let transport = client
///     .create_consumer_transport(CreateTransportRequest::default())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct SignalClient {
    rpc: Arc<RpcClient<mpsc::UnboundedSender<Frame>>>,
    router: JoinHandle<()>,
}

impl SignalClient {
    /// Create a client over a pair of frame channels
    ///
    /// Returns the client and a receiver for notifications. When `inbound`
    /// ends, every pending call fails with `ChannelClosed`.
    pub fn new(
        outbound: mpsc::UnboundedSender<Frame>,
        mut inbound: mpsc::UnboundedReceiver<Frame>,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let rpc = Arc::new(RpcClient::new(outbound));
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let router = {
            let rpc = Arc::clone(&rpc);
            tokio::spawn(async move {
                while let Some(frame) = inbound.recv().await {
                    match frame {
                        Frame::Ack(ack) => {
                            rpc.handle_ack(ack);
                        }
                        Frame::Event(envelope) => {
                            match Notification::decode(&envelope.event, envelope.data) {
                                Ok(notification) => {
                                    let _ = notify_tx.send(notification);
                                }
                                Err(e) => {
                                    tracing::warn!(error = %e, "Ignoring server event");
                                }
                            }
                        }
                    }
                }
                rpc.close();
            })
        };

        (Self { rpc, router }, notify_rx)
    }

    /// Client for a peer registered with `SignalServer::connect_in_process`
    pub fn local(connection: LocalConnection) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        Self::new(connection.outbound, connection.inbound)
    }

    /// Connect to a signaling server over WebSocket
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<Notification>)> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let Ok(text) = frame.to_text() else {
                    continue;
                };
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        tokio::spawn(async move {
            while let Some(Ok(message)) = ws_rx.next().await {
                match message {
                    Message::Text(text) => match Frame::parse(&text) {
                        Ok(frame) => {
                            if in_tx.send(frame).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Dropping malformed frame"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        Ok(Self::new(out_tx, in_rx))
    }

    async fn request(&self, request: Request) -> Result<Value> {
        let (event, data) = request.encode()?;
        Ok(self.rpc.call(event, data).await?)
    }

    /// Router capabilities
    pub async fn get_router_rtp_capabilities(&self) -> Result<RtpCapabilities> {
        let value = self.request(Request::GetRouterRtpCapabilities).await?;
        parse("getRouterRtpCapabilities", value)
    }

    pub async fn create_producer_transport(
        &self,
        request: CreateTransportRequest,
    ) -> Result<TransportParams> {
        let value = self
            .request(Request::CreateProducerTransport(request))
            .await?;
        parse("createProducerTransport", value)
    }

    pub async fn create_consumer_transport(
        &self,
        request: CreateTransportRequest,
    ) -> Result<TransportParams> {
        let value = self
            .request(Request::CreateConsumerTransport(request))
            .await?;
        parse("createConsumerTransport", value)
    }

    /// Submit DTLS parameters for a publish transport
    ///
    /// Without an id the server uses the latest publish transport.
    pub async fn connect_producer_transport(
        &self,
        transport_id: Option<TransportId>,
        dtls_parameters: DtlsParameters,
    ) -> Result<()> {
        self.request(Request::ConnectProducerTransport(ConnectTransportRequest {
            transport_id,
            dtls_parameters,
        }))
        .await?;
        Ok(())
    }

    /// Submit DTLS parameters for a subscribe transport
    pub async fn connect_consumer_transport(
        &self,
        transport_id: Option<TransportId>,
        dtls_parameters: DtlsParameters,
    ) -> Result<()> {
        self.request(Request::ConnectConsumerTransport(ConnectTransportRequest {
            transport_id,
            dtls_parameters,
        }))
        .await?;
        Ok(())
    }

    /// Publish a stream
    pub async fn produce(
        &self,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<ProducerId> {
        let value = self
            .request(Request::Produce(ProduceRequest {
                transport_id,
                kind,
                rtp_parameters,
            }))
            .await?;
        let produced: ProducedResponse = parse("produce", value)?;
        Ok(produced.id)
    }

    /// Subscribe to the current stream
    pub async fn consume(
        &self,
        transport_id: Option<TransportId>,
        rtp_capabilities: Option<RtpCapabilities>,
    ) -> Result<ConsumerDescriptor> {
        let value = self
            .request(Request::Consume(ConsumeRequest {
                transport_id,
                rtp_capabilities,
            }))
            .await?;
        parse("consume", value)
    }

    /// Ask the server to unpause video
    pub async fn resume(&self) -> Result<()> {
        self.request(Request::Resume).await?;
        Ok(())
    }

    /// Number of calls waiting for an acknowledgement
    pub fn pending_calls(&self) -> usize {
        self.rpc.pending_count()
    }
}

impl Drop for SignalClient {
    fn drop(&mut self) {
        self.router.abort();
        self.rpc.close();
    }
}

fn parse<T: DeserializeOwned>(event: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        ProtocolError::InvalidPayload {
            event: event.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::AckEnvelope;

    #[tokio::test]
    async fn test_typed_call_decodes_ack() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (client, _notifications) = SignalClient::new(out_tx, in_rx);

        let server = tokio::spawn(async move {
            match out_rx.recv().await.unwrap() {
                Frame::Event(env) => {
                    assert_eq!(env.event, "produce");
                    let ack = env.ack.unwrap();
                    in_tx
                        .send(Frame::Ack(AckEnvelope::success(ack, json!({ "id": "p-1" }))))
                        .unwrap();
                }
                other => panic!("unexpected frame: {:?}", other),
            }
            in_tx
        });

        let id = client
            .produce(TransportId::new("t-1"), MediaKind::Video, RtpParameters::default())
            .await
            .unwrap();
        assert_eq!(id, ProducerId::new("p-1"));
        let _in_tx = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_notifications_are_decoded() {
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (_client, mut notifications) = SignalClient::new(out_tx, in_rx);

        in_tx
            .send(Frame::Event(crate::protocol::EventEnvelope::notify(
                "newProducer",
                Value::Null,
            )))
            .unwrap();

        assert_eq!(notifications.recv().await.unwrap(), Notification::NewProducer);
    }

    #[tokio::test]
    async fn test_closed_inbound_fails_pending_call() {
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (client, _notifications) = SignalClient::new(out_tx, in_rx);

        let closer = tokio::spawn(async move {
            let _ = out_rx.recv().await;
            drop(in_tx);
            out_rx
        });

        let err = client.resume().await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Protocol(ProtocolError::ChannelClosed)
        ));
        let _ = closer.await;
    }
}
