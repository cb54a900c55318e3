//! Error types
//!
//! `SignalError` is what a coordinator operation rejects a request with,
//! `ProtocolError` covers the event channel and payload decoding, and
//! `EngineError` wraps failures reported by the media engine.

use std::fmt;

use crate::engine::TransportId;
use crate::protocol::constants::error_codes;
use crate::session::{ConnectionId, TransportRole};

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket I/O failure
    Io(std::io::Error),
    /// WebSocket handshake or framing failure
    WebSocket(tokio_tungstenite::tungstenite::Error),
    /// Event channel or payload error
    Protocol(ProtocolError),
    /// Coordinator rejected the operation
    Signal(SignalError),
}

impl Error {
    /// Code of a request the remote side rejected
    pub fn rejection_code(&self) -> Option<&str> {
        match self {
            Error::Protocol(ProtocolError::Rejected { code, .. }) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Signal(e) => write!(f, "Signaling error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::WebSocket(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Signal(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<SignalError> for Error {
    fn from(e: SignalError) -> Self {
        Error::Signal(e)
    }
}

/// Failure reported by the media engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// Engine operation that failed (e.g. "produce")
    pub operation: &'static str,
    /// Engine-provided reason
    pub message: String,
}

impl EngineError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.operation, self.message)
    }
}

impl std::error::Error for EngineError {}

/// Error type for coordinator operations
///
/// Every variant except `EngineInit` is surfaced to the calling connection as a
/// rejected acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// Media engine could not be started
    EngineInit(String),
    /// Media engine died; no further signaling is accepted
    EngineUnavailable,
    /// Connection is not registered (or already disconnected)
    UnknownConnection(ConnectionId),
    /// No transport with this id is owned by the caller (None: caller has no
    /// transport of the requested role)
    UnknownTransport(Option<TransportId>),
    /// Handshake parameters were already submitted for this transport
    AlreadyConnecting(TransportId),
    /// Transport has not completed its handshake
    TransportNotReady(TransportId),
    /// Transport reached a terminal state
    TransportClosed(TransportId),
    /// Transport exists but has the other role
    WrongRole {
        transport: TransportId,
        expected: TransportRole,
    },
    /// No live producer to consume from
    NoProducer,
    /// Caller capabilities cannot receive the producer's media
    IncompatibleCapabilities,
    /// Transport already carries a consumer
    AlreadyConsuming(TransportId),
    /// Media engine call failed
    EngineCall(EngineError),
}

impl SignalError {
    /// Stable code carried in rejected acknowledgements
    pub fn code(&self) -> &'static str {
        match self {
            SignalError::EngineInit(_) => error_codes::ENGINE_INIT,
            SignalError::EngineUnavailable => error_codes::ENGINE_UNAVAILABLE,
            SignalError::UnknownConnection(_) => error_codes::UNKNOWN_CONNECTION,
            SignalError::UnknownTransport(_) => error_codes::UNKNOWN_TRANSPORT,
            SignalError::AlreadyConnecting(_) => error_codes::ALREADY_CONNECTING,
            SignalError::TransportNotReady(_) => error_codes::TRANSPORT_NOT_READY,
            SignalError::TransportClosed(_) => error_codes::TRANSPORT_CLOSED,
            SignalError::WrongRole { .. } => error_codes::WRONG_ROLE,
            SignalError::NoProducer => error_codes::NO_PRODUCER,
            SignalError::IncompatibleCapabilities => error_codes::INCOMPATIBLE_CAPABILITIES,
            SignalError::AlreadyConsuming(_) => error_codes::ALREADY_CONSUMING,
            SignalError::EngineCall(_) => error_codes::ENGINE_CALL,
        }
    }

    /// Whether the process must terminate
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SignalError::EngineInit(_) | SignalError::EngineUnavailable
        )
    }

    /// Whether the peer can recover by re-issuing the create/connect sequence
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SignalError::UnknownTransport(_)
                | SignalError::AlreadyConnecting(_)
                | SignalError::TransportNotReady(_)
                | SignalError::TransportClosed(_)
                | SignalError::WrongRole { .. }
                | SignalError::NoProducer
                | SignalError::IncompatibleCapabilities
                | SignalError::AlreadyConsuming(_)
        )
    }
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalError::EngineInit(reason) => {
                write!(f, "Media engine initialization failed: {}", reason)
            }
            SignalError::EngineUnavailable => write!(f, "Media engine is unavailable"),
            SignalError::UnknownConnection(id) => write!(f, "Unknown connection: {}", id),
            SignalError::UnknownTransport(Some(id)) => write!(f, "Unknown transport: {}", id),
            SignalError::UnknownTransport(None) => {
                write!(f, "Unknown transport: none created for this role")
            }
            SignalError::AlreadyConnecting(id) => {
                write!(f, "Transport already connecting: {}", id)
            }
            SignalError::TransportNotReady(id) => write!(f, "Transport not connected: {}", id),
            SignalError::TransportClosed(id) => write!(f, "Transport closed: {}", id),
            SignalError::WrongRole {
                transport,
                expected,
            } => write!(f, "Transport {} is not a {} transport", transport, expected),
            SignalError::NoProducer => write!(f, "No producer available"),
            SignalError::IncompatibleCapabilities => {
                write!(f, "Capabilities cannot consume the current producer")
            }
            SignalError::AlreadyConsuming(id) => {
                write!(f, "Transport already has a consumer: {}", id)
            }
            SignalError::EngineCall(e) => write!(f, "Media engine error: {}", e),
        }
    }
}

impl std::error::Error for SignalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SignalError::EngineCall(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for SignalError {
    fn from(e: EngineError) -> Self {
        SignalError::EngineCall(e)
    }
}

/// Error type for the event channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Event name is not part of the signaling protocol
    UnknownEvent(String),
    /// Event payload did not match the event's schema
    InvalidPayload { event: String, reason: String },
    /// Frame is not a valid event or acknowledgement envelope
    MalformedEnvelope(String),
    /// Remote side rejected a call
    Rejected { code: String, message: String },
    /// Channel closed before the acknowledgement arrived
    ChannelClosed,
}

impl ProtocolError {
    /// Stable code carried in rejected acknowledgements
    pub fn code(&self) -> &str {
        match self {
            ProtocolError::UnknownEvent(_) => error_codes::UNKNOWN_EVENT,
            ProtocolError::InvalidPayload { .. } => error_codes::INVALID_PAYLOAD,
            ProtocolError::MalformedEnvelope(_) => error_codes::MALFORMED_ENVELOPE,
            ProtocolError::Rejected { code, .. } => code,
            ProtocolError::ChannelClosed => error_codes::CHANNEL_CLOSED,
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownEvent(name) => write!(f, "Unknown event: {}", name),
            ProtocolError::InvalidPayload { event, reason } => {
                write!(f, "Invalid payload for {}: {}", event, reason)
            }
            ProtocolError::MalformedEnvelope(reason) => write!(f, "Malformed envelope: {}", reason),
            ProtocolError::Rejected { code, message } => {
                write!(f, "Request rejected ({}): {}", code, message)
            }
            ProtocolError::ChannelClosed => write!(f, "Event channel closed"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_error_display() {
        let id = TransportId::new("t-1");
        assert_eq!(
            SignalError::AlreadyConnecting(id.clone()).to_string(),
            "Transport already connecting: t-1"
        );
        assert_eq!(
            SignalError::WrongRole {
                transport: id,
                expected: TransportRole::Subscribe,
            }
            .to_string(),
            "Transport t-1 is not a subscribe transport"
        );
    }

    #[test]
    fn test_signal_error_classification() {
        assert!(SignalError::EngineInit("no worker".into()).is_fatal());
        assert!(!SignalError::EngineInit("no worker".into()).is_recoverable());
        assert!(SignalError::IncompatibleCapabilities.is_recoverable());
        assert!(!SignalError::EngineCall(EngineError::new("consume", "boom")).is_recoverable());
        assert!(!SignalError::EngineCall(EngineError::new("consume", "boom")).is_fatal());
    }

    #[test]
    fn test_rejected_keeps_remote_code() {
        let err = ProtocolError::Rejected {
            code: error_codes::NO_PRODUCER.into(),
            message: "No producer available".into(),
        };
        assert_eq!(err.code(), error_codes::NO_PRODUCER);
    }

    #[test]
    fn test_rejection_code() {
        let err = Error::from(ProtocolError::Rejected {
            code: error_codes::ALREADY_CONNECTING.into(),
            message: "Transport already connecting: t-1".into(),
        });
        assert_eq!(err.rejection_code(), Some(error_codes::ALREADY_CONNECTING));
        assert_eq!(Error::from(ProtocolError::ChannelClosed).rejection_code(), None);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        assert!(matches!(Error::from(io_err), Error::Io(_)));
    }
}
