//! Event channel envelopes
//!
//! Every frame on the channel is either an event or an acknowledgement:
//!
//! ```text
//! {"event": "produce", "data": {...}, "ack": 7}        request expecting a reply
//! {"event": "newProducer"}                             one-way notification
//! {"ack": 7, "data": {"id": "..."}}                    acknowledgement
//! {"ack": 7, "error": {"code": "...", "message": "..."}} rejected request
//! ```
//!
//! `ack` is the correlation id chosen by the caller; the acknowledgement
//! echoes it back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, SignalError};

/// Named event with an optional correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

impl EventEnvelope {
    /// Event expecting an acknowledgement
    pub fn request(event: impl Into<String>, data: Value, ack: u64) -> Self {
        Self {
            event: event.into(),
            data,
            ack: Some(ack),
        }
    }

    /// Fire-and-forget event
    pub fn notify(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            ack: None,
        }
    }
}

/// Error carried by a rejected acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&SignalError> for ErrorBody {
    fn from(e: &SignalError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

impl From<&ProtocolError> for ErrorBody {
    fn from(e: &ProtocolError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

/// Reply to exactly one event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckEnvelope {
    pub ack: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl AckEnvelope {
    pub fn success(ack: u64, data: Value) -> Self {
        Self {
            ack,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(ack: u64, error: ErrorBody) -> Self {
        Self {
            ack,
            data: None,
            error: Some(error),
        }
    }

    /// Split into the caller-visible result
    pub fn into_result(self) -> Result<Value, ProtocolError> {
        match self.error {
            Some(error) => Err(ProtocolError::Rejected {
                code: error.code,
                message: error.message,
            }),
            None => Ok(self.data.unwrap_or(Value::Null)),
        }
    }
}

/// One frame on the event channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Event(EventEnvelope),
    Ack(AckEnvelope),
}

impl Frame {
    /// Parse a text frame
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }

    /// Serialize to a text frame
    pub fn to_text(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::MalformedEnvelope(e.to_string()))
    }
}
