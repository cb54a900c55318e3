//! Signaling protocol
//!
//! Typed requests, acknowledgements and notifications, plus the envelopes
//! that carry them over the event channel.

pub mod constants;
pub mod envelope;
pub mod message;

pub use envelope::{AckEnvelope, ErrorBody, EventEnvelope, Frame};
pub use message::{
    ConnectTransportRequest, ConsumeRequest, ConsumerClosedReason, ConsumerDescriptor,
    CreateTransportRequest, Notification, ProduceRequest, ProducedResponse, Request, Response,
};
