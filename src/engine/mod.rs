//! Media engine seam
//!
//! The signaling layer never touches media. Everything that packetizes,
//! encrypts or routes RTP lives behind [`MediaEngine`]; the coordinator only
//! asks it to create and connect transports, bind producers and consumers,
//! and tear them down again.
//!
//! ```text
//!   create_worker ──► create_router ──► create_webrtc_transport
//!                                              │
//!                                       connect_transport
//!                                              │
//!                                  produce / consume / resume
//! ```
//!
//! Engine-side failures that happen outside a call (worker death, ICE/DTLS
//! failure) arrive on the [`EngineEvent`] stream.

pub mod config;
pub mod memory;
pub mod types;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::EngineError;

pub use config::{MediaEngineConfig, RouterSettings, WebRtcTransportSettings};
pub use memory::MemoryEngine;
pub use types::{
    ConsumerId, ConsumerInfo, ConsumerOptions, ConsumerType, DtlsFingerprint, DtlsParameters,
    DtlsRole, EngineEvent, IceCandidate, IceParameters, ListenIp, MediaKind, ProducerId,
    Protocol, RouterHandle, RouterId, RtcpFeedback, RtpCapabilities, RtpCodecCapability,
    RtpCodecParameters, RtpHeaderExtension, RtpParameters, TransportId, TransportParams,
    WebRtcTransportOptions, WorkerId, WorkerSettings,
};

/// Media engine consumed by the coordinator
///
/// Calls may suspend for as long as the engine needs; none of them are
/// retried or timed out by the caller.
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    /// Start a worker process
    async fn create_worker(&self, settings: &WorkerSettings) -> Result<WorkerId, EngineError>;

    /// Create a router offering `media_codecs`
    async fn create_router(
        &self,
        worker: &WorkerId,
        media_codecs: &[RtpCodecCapability],
    ) -> Result<RouterHandle, EngineError>;

    /// Allocate ICE/DTLS material for a new transport
    async fn create_webrtc_transport(
        &self,
        router: &RouterId,
        options: &WebRtcTransportOptions,
    ) -> Result<TransportParams, EngineError>;

    /// Cap the bitrate the transport accepts from the peer
    async fn set_max_incoming_bitrate(
        &self,
        transport: &TransportId,
        bitrate: u32,
    ) -> Result<(), EngineError>;

    /// Submit the peer's DTLS parameters and complete the handshake
    async fn connect_transport(
        &self,
        transport: &TransportId,
        dtls_parameters: &DtlsParameters,
    ) -> Result<(), EngineError>;

    /// Start receiving a track on a connected transport
    async fn produce(
        &self,
        transport: &TransportId,
        kind: MediaKind,
        rtp_parameters: &RtpParameters,
    ) -> Result<ProducerId, EngineError>;

    /// Whether a device with `rtp_capabilities` can receive `producer`
    fn can_consume(
        &self,
        router: &RouterId,
        producer: &ProducerId,
        rtp_capabilities: &RtpCapabilities,
    ) -> bool;

    /// Start sending a producer's media on a connected transport
    async fn consume(
        &self,
        transport: &TransportId,
        options: &ConsumerOptions,
    ) -> Result<ConsumerInfo, EngineError>;

    /// Unpause a consumer; the engine requests a key frame from the producer
    async fn resume_consumer(&self, consumer: &ConsumerId) -> Result<(), EngineError>;

    async fn close_consumer(&self, consumer: &ConsumerId);

    async fn close_producer(&self, producer: &ProducerId);

    /// Close a transport together with anything still bound to it
    async fn close_transport(&self, transport: &TransportId);

    /// Subscribe to out-of-band engine events
    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent>;
}
