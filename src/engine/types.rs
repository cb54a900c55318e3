//! Media engine data types
//!
//! These mirror the objects the engine hands out and the parameter blocks
//! exchanged with the browser. Field names serialize in camelCase so they can
//! travel unchanged between peer and engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

macro_rules! engine_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an engine-assigned identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Allocate a fresh random identifier
            pub fn random() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

engine_id!(
    /// Media engine worker process
    WorkerId
);
engine_id!(
    /// Router inside a worker
    RouterId
);
engine_id!(
    /// WebRTC transport
    TransportId
);
engine_id!(
    /// Published media stream
    ProducerId
);
engine_id!(
    /// Subscriber-side receiver of a producer
    ConsumerId
);

/// Media kind of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// RTCP feedback mechanism supported by a codec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcpFeedback {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameter: String,
}

/// Codec supported by the router or a peer device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecCapability {
    pub kind: MediaKind,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_payload_type: Option<u8>,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecCapability {
    /// Opus stereo at 48kHz
    pub fn opus() -> Self {
        Self {
            kind: MediaKind::Audio,
            mime_type: "audio/opus".into(),
            preferred_payload_type: None,
            clock_rate: 48000,
            channels: Some(2),
            parameters: Map::new(),
            rtcp_feedback: Vec::new(),
        }
    }

    /// VP8 at 90kHz with a 1000kbps start bitrate hint
    pub fn vp8() -> Self {
        let mut parameters = Map::new();
        parameters.insert("x-google-start-bitrate".into(), Value::from(1000));

        Self {
            kind: MediaKind::Video,
            mime_type: "video/VP8".into(),
            preferred_payload_type: None,
            clock_rate: 90000,
            channels: None,
            parameters,
            rtcp_feedback: Vec::new(),
        }
    }

    /// Whether the codec is a retransmission codec rather than media
    pub fn is_rtx(&self) -> bool {
        is_rtx_mime(&self.mime_type)
    }
}

fn is_rtx_mime(mime_type: &str) -> bool {
    mime_type
        .rsplit('/')
        .next()
        .is_some_and(|subtype| subtype.eq_ignore_ascii_case("rtx"))
}

/// Header extension supported by the router or a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpHeaderExtension {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
    pub uri: String,
    pub preferred_id: u16,
    #[serde(default)]
    pub preferred_encrypt: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

/// Negotiated capabilities: the codecs and header extensions an endpoint
/// can send or receive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCapabilities {
    #[serde(default)]
    pub codecs: Vec<RtpCodecCapability>,
    #[serde(default)]
    pub header_extensions: Vec<RtpHeaderExtension>,
}

impl RtpCapabilities {
    /// Whether a codec with this kind, mime type, clock rate and channel
    /// count is listed
    pub fn supports(&self, kind: MediaKind, mime_type: &str, clock_rate: u32, channels: Option<u8>) -> bool {
        self.codecs.iter().any(|c| {
            c.kind == kind
                && c.mime_type.eq_ignore_ascii_case(mime_type)
                && c.clock_rate == clock_rate
                && (kind == MediaKind::Video || c.channels.unwrap_or(1) == channels.unwrap_or(1))
        })
    }

    /// Whether any media codec of this kind is listed
    pub fn has_kind(&self, kind: MediaKind) -> bool {
        self.codecs.iter().any(|c| c.kind == kind && !c.is_rtx())
    }
}

/// Codec as negotiated inside RTP parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpCodecParameters {
    pub mime_type: String,
    pub payload_type: u8,
    pub clock_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rtcp_feedback: Vec<RtcpFeedback>,
}

impl RtpCodecParameters {
    pub fn is_rtx(&self) -> bool {
        is_rtx_mime(&self.mime_type)
    }
}

/// RTP parameters of a producer or consumer
///
/// Encodings, header extensions and RTCP settings are passed through to the
/// engine untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(default)]
    pub codecs: Vec<RtpCodecParameters>,
    #[serde(default)]
    pub header_extensions: Vec<Value>,
    #[serde(default)]
    pub encodings: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtcp: Option<Value>,
}

impl RtpParameters {
    /// First non-RTX codec
    pub fn media_codec(&self) -> Option<&RtpCodecParameters> {
        self.codecs.iter().find(|c| !c.is_rtx())
    }
}

/// ICE credentials of a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceParameters {
    pub username_fragment: String,
    pub password: String,
    #[serde(default)]
    pub ice_lite: bool,
}

/// Transport protocol of an ICE candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
}

/// Local ICE candidate of a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub foundation: String,
    pub priority: u32,
    pub ip: String,
    pub protocol: Protocol,
    pub port: u16,
    #[serde(rename = "type")]
    pub candidate_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp_type: Option<String>,
}

/// DTLS role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtlsRole {
    Auto,
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtlsFingerprint {
    pub algorithm: String,
    pub value: String,
}

/// DTLS handshake parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DtlsParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<DtlsRole>,
    pub fingerprints: Vec<DtlsFingerprint>,
}

/// Connection parameters returned to the peer for a new transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportParams {
    pub id: TransportId,
    pub ice_parameters: IceParameters,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_parameters: DtlsParameters,
}

/// Address the engine listens on for media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenIp {
    pub ip: String,
    #[serde(default)]
    pub announced_ip: Option<String>,
}

impl ListenIp {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            announced_ip: None,
        }
    }
}

/// Options for creating a WebRTC transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebRtcTransportOptions {
    pub listen_ips: Vec<ListenIp>,
    pub enable_udp: bool,
    pub enable_tcp: bool,
    pub prefer_udp: bool,
    pub initial_available_outgoing_bitrate: u32,
}

/// Worker process settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkerSettings {
    pub rtc_min_port: u16,
    pub rtc_max_port: u16,
    pub log_level: String,
    pub log_tags: Vec<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            rtc_min_port: 10000,
            rtc_max_port: 10100,
            log_level: "warn".into(),
            log_tags: ["info", "ice", "dtls", "rtp", "srtp", "rtcp"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Router handed out by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RouterHandle {
    pub id: RouterId,
    pub rtp_capabilities: RtpCapabilities,
}

/// Consumer type chosen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerType {
    Simple,
    Simulcast,
    Svc,
    Pipe,
}

/// Options for creating a consumer
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerOptions {
    pub producer_id: ProducerId,
    pub rtp_capabilities: RtpCapabilities,
    pub paused: bool,
}

/// Consumer handed out by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerInfo {
    pub id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: RtpParameters,
    pub consumer_type: ConsumerType,
    pub producer_paused: bool,
}

/// Asynchronous engine-side events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Worker process terminated unexpectedly
    WorkerDied { worker_id: WorkerId },
    /// ICE or DTLS failed on a transport
    TransportFailed { transport_id: TransportId },
}
