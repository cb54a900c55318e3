//! Request dispatch
//!
//! Maps each decoded request onto one coordinator operation.

use crate::coordinator::{SessionCoordinator, TransportOptions};
use crate::engine::MediaEngine;
use crate::error::SignalError;
use crate::protocol::{CreateTransportRequest, ProducedResponse, Request, Response};
use crate::session::{ConnectionId, TransportRole};

impl From<CreateTransportRequest> for TransportOptions {
    fn from(req: CreateTransportRequest) -> Self {
        Self {
            force_tcp: req.force_tcp,
            rtp_capabilities: req.rtp_capabilities,
        }
    }
}

/// Run one request for `conn`
pub async fn dispatch<E: MediaEngine>(
    coordinator: &SessionCoordinator<E>,
    conn: ConnectionId,
    request: Request,
) -> Result<Response, SignalError> {
    match request {
        Request::GetRouterRtpCapabilities => coordinator
            .get_capabilities(conn)
            .await
            .map(Response::Capabilities),
        Request::CreateProducerTransport(req) => coordinator
            .create_publish_transport(conn, req.into())
            .await
            .map(Response::TransportCreated),
        Request::CreateConsumerTransport(req) => coordinator
            .create_subscribe_transport(conn, req.into())
            .await
            .map(Response::TransportCreated),
        Request::ConnectProducerTransport(req) => coordinator
            .connect_transport(
                conn,
                TransportRole::Publish,
                req.transport_id.as_ref(),
                &req.dtls_parameters,
            )
            .await
            .map(|()| Response::Connected),
        Request::ConnectConsumerTransport(req) => coordinator
            .connect_transport(
                conn,
                TransportRole::Subscribe,
                req.transport_id.as_ref(),
                &req.dtls_parameters,
            )
            .await
            .map(|()| Response::Connected),
        Request::Produce(req) => coordinator
            .publish(conn, &req.transport_id, req.kind, req.rtp_parameters)
            .await
            .map(|id| Response::Produced(ProducedResponse { id })),
        Request::Consume(req) => coordinator
            .consume(conn, req.transport_id.as_ref(), req.rtp_capabilities)
            .await
            .map(Response::Consumed),
        Request::Resume => coordinator
            .resume_consumption(conn)
            .await
            .map(|()| Response::Resumed),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::{MediaEngineConfig, MemoryEngine};
    use crate::protocol::ConsumeRequest;

    #[tokio::test]
    async fn test_dispatch_maps_operations() {
        let coordinator =
            SessionCoordinator::start(Arc::new(MemoryEngine::new()), MediaEngineConfig::default())
                .await
                .unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = ConnectionId(1);
        coordinator.register_connection(conn, None, tx).await.unwrap();

        let response = dispatch(&coordinator, conn, Request::GetRouterRtpCapabilities)
            .await
            .unwrap();
        assert!(matches!(response, Response::Capabilities(caps) if caps.codecs.len() == 2));

        let response = dispatch(
            &coordinator,
            conn,
            Request::CreateConsumerTransport(CreateTransportRequest::default()),
        )
        .await
        .unwrap();
        assert!(matches!(response, Response::TransportCreated(_)));

        assert_eq!(
            dispatch(&coordinator, conn, Request::Consume(ConsumeRequest::default())).await,
            Err(SignalError::NoProducer)
        );
        assert_eq!(
            dispatch(&coordinator, conn, Request::Resume).await,
            Ok(Response::Resumed)
        );
    }
}
