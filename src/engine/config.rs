//! Media engine configuration
//!
//! Opaque to the signaling layer apart from the pieces it forwards to the
//! engine: worker settings, the router's codec list and WebRTC transport
//! parameters.

use serde::{Deserialize, Serialize};

use super::types::{ListenIp, RtpCodecCapability, WebRtcTransportOptions, WorkerSettings};

/// Router settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouterSettings {
    /// Codecs the router offers to peers
    pub media_codecs: Vec<RtpCodecCapability>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            media_codecs: vec![RtpCodecCapability::opus(), RtpCodecCapability::vp8()],
        }
    }
}

/// WebRTC transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebRtcTransportSettings {
    /// Addresses the engine binds media sockets to
    pub listen_ips: Vec<ListenIp>,
    /// Incoming bitrate cap applied after creation (None = engine default)
    pub max_incoming_bitrate: Option<u32>,
    /// Outgoing bitrate estimate the transport starts with
    pub initial_available_outgoing_bitrate: u32,
}

impl Default for WebRtcTransportSettings {
    fn default() -> Self {
        Self {
            listen_ips: vec![ListenIp::new("127.0.0.1")],
            max_incoming_bitrate: Some(1_500_000),
            initial_available_outgoing_bitrate: 1_000_000,
        }
    }
}

/// Complete media engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaEngineConfig {
    pub worker: WorkerSettings,
    pub router: RouterSettings,
    pub webrtc_transport: WebRtcTransportSettings,
}

impl MediaEngineConfig {
    /// Set the RTC port range
    pub fn port_range(mut self, min: u16, max: u16) -> Self {
        self.worker.rtc_min_port = min;
        self.worker.rtc_max_port = max;
        self
    }

    /// Replace the router codec list
    pub fn media_codecs(mut self, codecs: Vec<RtpCodecCapability>) -> Self {
        self.router.media_codecs = codecs;
        self
    }

    /// Replace the listen addresses with a single one
    pub fn listen_ip(mut self, ip: impl Into<String>, announced_ip: Option<String>) -> Self {
        self.webrtc_transport.listen_ips = vec![ListenIp {
            ip: ip.into(),
            announced_ip,
        }];
        self
    }

    /// Set the incoming bitrate cap
    pub fn max_incoming_bitrate(mut self, bitrate: Option<u32>) -> Self {
        self.webrtc_transport.max_incoming_bitrate = bitrate;
        self
    }

    /// Transport options for one `create*Transport` request
    ///
    /// UDP and TCP are both offered with UDP preferred, unless the peer forces
    /// TCP.
    pub fn transport_options(&self, force_tcp: bool) -> WebRtcTransportOptions {
        WebRtcTransportOptions {
            listen_ips: self.webrtc_transport.listen_ips.clone(),
            enable_udp: !force_tcp,
            enable_tcp: true,
            prefer_udp: !force_tcp,
            initial_available_outgoing_bitrate: self
                .webrtc_transport
                .initial_available_outgoing_bitrate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MediaKind;

    #[test]
    fn test_default_config() {
        let config = MediaEngineConfig::default();

        assert_eq!(config.worker.rtc_min_port, 10000);
        assert_eq!(config.worker.rtc_max_port, 10100);
        assert_eq!(config.worker.log_level, "warn");
        assert_eq!(config.router.media_codecs.len(), 2);
        assert_eq!(config.router.media_codecs[0].kind, MediaKind::Audio);
        assert_eq!(config.router.media_codecs[1].mime_type, "video/VP8");
        assert_eq!(config.webrtc_transport.max_incoming_bitrate, Some(1_500_000));
        assert_eq!(
            config.webrtc_transport.initial_available_outgoing_bitrate,
            1_000_000
        );
    }

    #[test]
    fn test_transport_options_force_tcp() {
        let config = MediaEngineConfig::default();

        let udp = config.transport_options(false);
        assert!(udp.enable_udp && udp.enable_tcp && udp.prefer_udp);

        let tcp = config.transport_options(true);
        assert!(!tcp.enable_udp);
        assert!(tcp.enable_tcp);
        assert!(!tcp.prefer_udp);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: MediaEngineConfig = serde_json::from_str(
            r#"{ "worker": { "rtcMinPort": 20000, "rtcMaxPort": 20050 },
                 "webrtcTransport": { "listenIps": [{ "ip": "0.0.0.0", "announcedIp": "203.0.113.7" }] } }"#,
        )
        .unwrap();

        assert_eq!(config.worker.rtc_min_port, 20000);
        assert_eq!(config.worker.log_level, "warn");
        assert_eq!(
            config.webrtc_transport.listen_ips[0].announced_ip.as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(config.router.media_codecs.len(), 2);
    }

    #[test]
    fn test_builder_chaining() {
        let config = MediaEngineConfig::default()
            .port_range(40000, 40010)
            .listen_ip("10.0.0.1", None)
            .max_incoming_bitrate(None)
            .media_codecs(vec![RtpCodecCapability::vp8()]);

        assert_eq!(config.worker.rtc_min_port, 40000);
        assert_eq!(config.worker.rtc_max_port, 40010);
        assert_eq!(config.webrtc_transport.listen_ips[0].ip, "10.0.0.1");
        assert_eq!(config.webrtc_transport.max_incoming_bitrate, None);
        assert_eq!(config.router.media_codecs.len(), 1);
    }
}
