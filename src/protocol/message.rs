//! Signaling messages
//!
//! Each inbound event name maps to exactly one typed request. Payloads are
//! validated here, before anything reaches the coordinator.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::constants::*;
use crate::engine::{
    ConsumerId, ConsumerInfo, ConsumerType, DtlsParameters, MediaKind, ProducerId,
    RtpCapabilities, RtpParameters, TransportId, TransportParams,
};
use crate::error::ProtocolError;
use crate::session::TransportState;

/// `createProducerTransport` / `createConsumerTransport` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransportRequest {
    #[serde(default)]
    pub force_tcp: bool,
    /// Device capabilities (sent with producer transports)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp_capabilities: Option<RtpCapabilities>,
}

/// `connectProducerTransport` / `connectConsumerTransport` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectTransportRequest {
    /// Omitted by clients that only ever hold one transport per role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_id: Option<TransportId>,
    pub dtls_parameters: DtlsParameters,
}

/// `produce` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceRequest {
    pub transport_id: TransportId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
}

/// `consume` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_id: Option<TransportId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtp_capabilities: Option<RtpCapabilities>,
}

/// Peer -> coordinator request
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetRouterRtpCapabilities,
    CreateProducerTransport(CreateTransportRequest),
    CreateConsumerTransport(CreateTransportRequest),
    ConnectProducerTransport(ConnectTransportRequest),
    ConnectConsumerTransport(ConnectTransportRequest),
    Produce(ProduceRequest),
    Consume(ConsumeRequest),
    Resume,
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, ProtocolError> {
    // Clients send no data at all for argument-less requests
    let data = match data {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

fn to_value<T: Serialize>(event: &str, data: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(data).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

impl Request {
    /// Decode an inbound event
    pub fn decode(event: &str, data: Value) -> Result<Self, ProtocolError> {
        match event {
            EVENT_GET_ROUTER_RTP_CAPABILITIES => Ok(Request::GetRouterRtpCapabilities),
            EVENT_CREATE_PRODUCER_TRANSPORT => {
                Ok(Request::CreateProducerTransport(payload(event, data)?))
            }
            EVENT_CREATE_CONSUMER_TRANSPORT => {
                Ok(Request::CreateConsumerTransport(payload(event, data)?))
            }
            EVENT_CONNECT_PRODUCER_TRANSPORT => {
                Ok(Request::ConnectProducerTransport(payload(event, data)?))
            }
            EVENT_CONNECT_CONSUMER_TRANSPORT => {
                Ok(Request::ConnectConsumerTransport(payload(event, data)?))
            }
            EVENT_PRODUCE => Ok(Request::Produce(payload(event, data)?)),
            EVENT_CONSUME => Ok(Request::Consume(payload(event, data)?)),
            EVENT_RESUME | EVENT_NEW_CONSUMER => Ok(Request::Resume),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    /// Event name and payload for sending
    pub fn encode(&self) -> Result<(&'static str, Value), ProtocolError> {
        let event = self.event_name();
        let data = match self {
            Request::GetRouterRtpCapabilities | Request::Resume => {
                Value::Object(Default::default())
            }
            Request::CreateProducerTransport(req) | Request::CreateConsumerTransport(req) => {
                to_value(event, req)?
            }
            Request::ConnectProducerTransport(req) | Request::ConnectConsumerTransport(req) => {
                to_value(event, req)?
            }
            Request::Produce(req) => to_value(event, req)?,
            Request::Consume(req) => to_value(event, req)?,
        };
        Ok((event, data))
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Request::GetRouterRtpCapabilities => EVENT_GET_ROUTER_RTP_CAPABILITIES,
            Request::CreateProducerTransport(_) => EVENT_CREATE_PRODUCER_TRANSPORT,
            Request::CreateConsumerTransport(_) => EVENT_CREATE_CONSUMER_TRANSPORT,
            Request::ConnectProducerTransport(_) => EVENT_CONNECT_PRODUCER_TRANSPORT,
            Request::ConnectConsumerTransport(_) => EVENT_CONNECT_CONSUMER_TRANSPORT,
            Request::Produce(_) => EVENT_PRODUCE,
            Request::Consume(_) => EVENT_CONSUME,
            Request::Resume => EVENT_RESUME,
        }
    }
}

/// `produce` acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedResponse {
    pub id: ProducerId,
}

/// `consume` acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerDescriptor {
    pub producer_id: ProducerId,
    pub id: ConsumerId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    #[serde(rename = "type")]
    pub consumer_type: ConsumerType,
    pub producer_paused: bool,
    /// Video consumers start paused until the subscriber sends `resume`
    pub paused: bool,
}

impl ConsumerDescriptor {
    pub fn new(info: ConsumerInfo, paused: bool) -> Self {
        Self {
            producer_id: info.producer_id,
            id: info.id,
            kind: info.kind,
            rtp_parameters: info.rtp_parameters,
            consumer_type: info.consumer_type,
            producer_paused: info.producer_paused,
            paused,
        }
    }
}

/// Successful acknowledgement payload
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Capabilities(Arc<RtpCapabilities>),
    TransportCreated(TransportParams),
    Connected,
    Produced(ProducedResponse),
    Consumed(ConsumerDescriptor),
    Resumed,
}

impl Response {
    pub fn into_value(self) -> Result<Value, ProtocolError> {
        match self {
            Response::Capabilities(caps) => to_value(EVENT_GET_ROUTER_RTP_CAPABILITIES, &*caps),
            Response::TransportCreated(params) => to_value("transport", &params),
            Response::Connected | Response::Resumed => Ok(Value::Object(Default::default())),
            Response::Produced(produced) => to_value(EVENT_PRODUCE, &produced),
            Response::Consumed(descriptor) => to_value(EVENT_CONSUME, &descriptor),
        }
    }
}

/// Why a consumer was torn down by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsumerClosedReason {
    /// Publisher disconnected
    ProducerClosed,
    /// Publisher published a new stream
    ProducerReplaced,
    /// A transport on either side failed
    TransportFailed,
}

/// Coordinator -> peer one-way notification
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    NewProducer,
    ConsumerClosed {
        consumer_id: ConsumerId,
        reason: ConsumerClosedReason,
    },
    TransportStateChange {
        transport_id: TransportId,
        state: TransportState,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsumerClosedPayload {
    consumer_id: ConsumerId,
    reason: ConsumerClosedReason,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransportStatePayload {
    transport_id: TransportId,
    state: TransportState,
}

impl Notification {
    pub fn event_name(&self) -> &'static str {
        match self {
            Notification::NewProducer => EVENT_NEW_PRODUCER,
            Notification::ConsumerClosed { .. } => EVENT_CONSUMER_CLOSED,
            Notification::TransportStateChange { .. } => EVENT_TRANSPORT_STATE_CHANGE,
        }
    }

    pub fn encode(&self) -> Result<(&'static str, Value), ProtocolError> {
        let event = self.event_name();
        let data = match self {
            Notification::NewProducer => Value::Null,
            Notification::ConsumerClosed {
                consumer_id,
                reason,
            } => to_value(
                event,
                &ConsumerClosedPayload {
                    consumer_id: consumer_id.clone(),
                    reason: *reason,
                },
            )?,
            Notification::TransportStateChange {
                transport_id,
                state,
            } => to_value(
                event,
                &TransportStatePayload {
                    transport_id: transport_id.clone(),
                    state: *state,
                },
            )?,
        };
        Ok((event, data))
    }

    pub fn decode(event: &str, data: Value) -> Result<Self, ProtocolError> {
        match event {
            EVENT_NEW_PRODUCER => Ok(Notification::NewProducer),
            EVENT_CONSUMER_CLOSED => {
                let p: ConsumerClosedPayload = payload(event, data)?;
                Ok(Notification::ConsumerClosed {
                    consumer_id: p.consumer_id,
                    reason: p.reason,
                })
            }
            EVENT_TRANSPORT_STATE_CHANGE => {
                let p: TransportStatePayload = payload(event, data)?;
                Ok(Notification::TransportStateChange {
                    transport_id: p.transport_id,
                    state: p.state,
                })
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}
