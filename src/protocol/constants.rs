//! Signaling protocol constants

use std::time::Duration;

// Peer -> coordinator requests
pub const EVENT_GET_ROUTER_RTP_CAPABILITIES: &str = "getRouterRtpCapabilities";
pub const EVENT_CREATE_PRODUCER_TRANSPORT: &str = "createProducerTransport";
pub const EVENT_CREATE_CONSUMER_TRANSPORT: &str = "createConsumerTransport";
pub const EVENT_CONNECT_PRODUCER_TRANSPORT: &str = "connectProducerTransport";
pub const EVENT_CONNECT_CONSUMER_TRANSPORT: &str = "connectConsumerTransport";
pub const EVENT_PRODUCE: &str = "produce";
pub const EVENT_CONSUME: &str = "consume";
pub const EVENT_RESUME: &str = "resume";
/// Older clients announce readiness under this name instead of `resume`
pub const EVENT_NEW_CONSUMER: &str = "newConsumer";

// Coordinator -> peer notifications
pub const EVENT_NEW_PRODUCER: &str = "newProducer";
pub const EVENT_CONSUMER_CLOSED: &str = "consumerClosed";
pub const EVENT_TRANSPORT_STATE_CHANGE: &str = "transportStateChange";

/// Default WebSocket path the signaling endpoint is mounted on
pub const DEFAULT_SIGNALING_PATH: &str = "/server";

/// Default listen port
pub const DEFAULT_LISTEN_PORT: u16 = 3000;

/// Delay between detecting engine death and terminating
pub const ENGINE_DEATH_GRACE: Duration = Duration::from_secs(2);

/// Codes carried in rejected acknowledgements
pub mod error_codes {
    pub const ENGINE_INIT: &str = "ENGINE_INIT";
    pub const ENGINE_UNAVAILABLE: &str = "ENGINE_UNAVAILABLE";
    pub const UNKNOWN_CONNECTION: &str = "UNKNOWN_CONNECTION";
    pub const UNKNOWN_TRANSPORT: &str = "UNKNOWN_TRANSPORT";
    pub const ALREADY_CONNECTING: &str = "ALREADY_CONNECTING";
    pub const TRANSPORT_NOT_READY: &str = "TRANSPORT_NOT_READY";
    pub const TRANSPORT_CLOSED: &str = "TRANSPORT_CLOSED";
    pub const WRONG_ROLE: &str = "WRONG_ROLE";
    pub const NO_PRODUCER: &str = "NO_PRODUCER";
    pub const INCOMPATIBLE_CAPABILITIES: &str = "INCOMPATIBLE_CAPABILITIES";
    pub const ALREADY_CONSUMING: &str = "ALREADY_CONSUMING";
    pub const ENGINE_CALL: &str = "ENGINE_CALL";

    pub const UNKNOWN_EVENT: &str = "UNKNOWN_EVENT";
    pub const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
    pub const MALFORMED_ENVELOPE: &str = "MALFORMED_ENVELOPE";
    pub const CHANNEL_CLOSED: &str = "CHANNEL_CLOSED";
}
