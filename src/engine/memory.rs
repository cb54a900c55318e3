//! In-process media engine
//!
//! `MemoryEngine` keeps every engine object in a map and completes each call
//! immediately. No media flows; it exists so the coordinator can be driven
//! end to end without an SFU process, and it records enough state (pause
//! flags, live object counts) for tests to check that teardown leaks nothing.
//!
//! Failures can be injected per operation with [`MemoryEngine::fail_next`],
//! and engine-side events raised with [`MemoryEngine::kill_worker`] and
//! [`MemoryEngine::fail_transport`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::types::*;
use super::MediaEngine;
use crate::error::EngineError;

const EVENT_CAPACITY: usize = 64;

struct MemoryWorker {
    settings: WorkerSettings,
    next_port: u16,
}

struct MemoryTransport {
    router: RouterId,
    connected: bool,
    max_incoming_bitrate: Option<u32>,
}

struct MemoryProducer {
    transport: TransportId,
    router: RouterId,
    kind: MediaKind,
    rtp_parameters: RtpParameters,
}

struct MemoryConsumer {
    transport: TransportId,
    producer: ProducerId,
    paused: bool,
    resume_count: u32,
}

#[derive(Default)]
struct EngineState {
    workers: HashMap<WorkerId, MemoryWorker>,
    routers: HashMap<RouterId, (WorkerId, RtpCapabilities)>,
    transports: HashMap<TransportId, MemoryTransport>,
    producers: HashMap<ProducerId, MemoryProducer>,
    consumers: HashMap<ConsumerId, MemoryConsumer>,
    fail_next: HashSet<&'static str>,
}

impl EngineState {
    fn take_failure(&mut self, operation: &'static str) -> Result<(), EngineError> {
        if self.fail_next.remove(operation) {
            Err(EngineError::new(operation, "injected failure"))
        } else {
            Ok(())
        }
    }

    fn allocate_port(&mut self, router: &RouterId) -> u16 {
        let worker_id = match self.routers.get(router) {
            Some((worker_id, _)) => worker_id.clone(),
            None => return 0,
        };
        match self.workers.get_mut(&worker_id) {
            Some(worker) => {
                let port = worker.next_port;
                worker.next_port = if port >= worker.settings.rtc_max_port {
                    worker.settings.rtc_min_port
                } else {
                    port + 1
                };
                port
            }
            None => 0,
        }
    }

    fn remove_consumers_where(&mut self, predicate: impl Fn(&MemoryConsumer) -> bool) {
        self.consumers.retain(|_, c| !predicate(c));
    }

    fn remove_producer(&mut self, producer: &ProducerId) {
        if self.producers.remove(producer).is_some() {
            self.remove_consumers_where(|c| &c.producer == producer);
        }
    }
}

/// In-process [`MediaEngine`]
pub struct MemoryEngine {
    state: Mutex<EngineState>,
    events: broadcast::Sender<EngineEvent>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(EngineState::default()),
            events,
        }
    }

    /// Make the next call of `operation` fail (e.g. "connect_transport")
    pub fn fail_next(&self, operation: &'static str) {
        self.state.lock().fail_next.insert(operation);
    }

    /// Simulate an unexpected worker exit
    pub fn kill_worker(&self) {
        let workers: Vec<WorkerId> = {
            let mut state = self.state.lock();
            let ids = state.workers.keys().cloned().collect();
            *state = EngineState::default();
            ids
        };
        for worker_id in workers {
            let _ = self.events.send(EngineEvent::WorkerDied { worker_id });
        }
    }

    /// Simulate an ICE/DTLS failure on a transport
    pub fn fail_transport(&self, transport_id: &TransportId) {
        {
            let mut state = self.state.lock();
            if let Some(transport) = state.transports.get_mut(transport_id) {
                transport.connected = false;
            }
        }
        let _ = self.events.send(EngineEvent::TransportFailed {
            transport_id: transport_id.clone(),
        });
    }

    /// Pause flag of a consumer, if it exists
    pub fn consumer_paused(&self, consumer: &ConsumerId) -> Option<bool> {
        self.state.lock().consumers.get(consumer).map(|c| c.paused)
    }

    /// How many times a consumer was actually unpaused
    pub fn resume_count(&self, consumer: &ConsumerId) -> u32 {
        self.state
            .lock()
            .consumers
            .get(consumer)
            .map_or(0, |c| c.resume_count)
    }

    /// Incoming bitrate cap applied to a transport
    pub fn max_incoming_bitrate(&self, transport: &TransportId) -> Option<u32> {
        self.state
            .lock()
            .transports
            .get(transport)
            .and_then(|t| t.max_incoming_bitrate)
    }

    pub fn transport_count(&self) -> usize {
        self.state.lock().transports.len()
    }

    pub fn producer_count(&self) -> usize {
        self.state.lock().producers.len()
    }

    pub fn consumer_count(&self) -> usize {
        self.state.lock().consumers.len()
    }

    pub fn has_consumer(&self, consumer: &ConsumerId) -> bool {
        self.state.lock().consumers.contains_key(consumer)
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(len);
    token
}

fn random_fingerprint() -> String {
    let hex = format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    );
    hex.as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).to_uppercase())
        .collect::<Vec<_>>()
        .join(":")
}

#[async_trait]
impl MediaEngine for MemoryEngine {
    async fn create_worker(&self, settings: &WorkerSettings) -> Result<WorkerId, EngineError> {
        let mut state = self.state.lock();
        state.take_failure("create_worker")?;

        if settings.rtc_min_port > settings.rtc_max_port {
            return Err(EngineError::new(
                "create_worker",
                format!(
                    "invalid port range {}-{}",
                    settings.rtc_min_port, settings.rtc_max_port
                ),
            ));
        }

        let id = WorkerId::random();
        state.workers.insert(
            id.clone(),
            MemoryWorker {
                settings: settings.clone(),
                next_port: settings.rtc_min_port,
            },
        );
        Ok(id)
    }

    async fn create_router(
        &self,
        worker: &WorkerId,
        media_codecs: &[RtpCodecCapability],
    ) -> Result<RouterHandle, EngineError> {
        let mut state = self.state.lock();
        state.take_failure("create_router")?;

        if !state.workers.contains_key(worker) {
            return Err(EngineError::new("create_router", "worker closed"));
        }
        if media_codecs.is_empty() {
            return Err(EngineError::new("create_router", "no media codecs"));
        }

        // Assign dynamic payload types the way a router would
        let codecs = media_codecs
            .iter()
            .zip(100u8..)
            .map(|(codec, pt)| RtpCodecCapability {
                preferred_payload_type: codec.preferred_payload_type.or(Some(pt)),
                ..codec.clone()
            })
            .collect();
        let rtp_capabilities = RtpCapabilities {
            codecs,
            header_extensions: Vec::new(),
        };

        let id = RouterId::random();
        state
            .routers
            .insert(id.clone(), (worker.clone(), rtp_capabilities.clone()));
        Ok(RouterHandle {
            id,
            rtp_capabilities,
        })
    }

    async fn create_webrtc_transport(
        &self,
        router: &RouterId,
        options: &WebRtcTransportOptions,
    ) -> Result<TransportParams, EngineError> {
        let mut state = self.state.lock();
        state.take_failure("create_webrtc_transport")?;

        if !state.routers.contains_key(router) {
            return Err(EngineError::new("create_webrtc_transport", "router closed"));
        }

        let port = state.allocate_port(router);
        let mut protocols = Vec::new();
        if options.enable_udp {
            protocols.push(Protocol::Udp);
        }
        if options.enable_tcp {
            protocols.push(Protocol::Tcp);
        }
        if !options.prefer_udp {
            protocols.reverse();
        }

        let ice_candidates = options
            .listen_ips
            .iter()
            .flat_map(|listen| {
                let ip = listen.announced_ip.clone().unwrap_or_else(|| listen.ip.clone());
                protocols.iter().enumerate().map(move |(rank, protocol)| IceCandidate {
                    foundation: format!("{:?}{}", protocol, rank).to_lowercase(),
                    priority: 1_076_302_079 - rank as u32,
                    ip: ip.clone(),
                    protocol: *protocol,
                    port,
                    candidate_type: "host".into(),
                    tcp_type: (*protocol == Protocol::Tcp).then(|| "passive".into()),
                })
            })
            .collect();

        let id = TransportId::random();
        state.transports.insert(
            id.clone(),
            MemoryTransport {
                router: router.clone(),
                connected: false,
                max_incoming_bitrate: None,
            },
        );

        Ok(TransportParams {
            id,
            ice_parameters: IceParameters {
                username_fragment: random_token(16),
                password: random_token(32),
                ice_lite: true,
            },
            ice_candidates,
            dtls_parameters: DtlsParameters {
                role: Some(DtlsRole::Auto),
                fingerprints: vec![DtlsFingerprint {
                    algorithm: "sha-256".into(),
                    value: random_fingerprint(),
                }],
            },
        })
    }

    async fn set_max_incoming_bitrate(
        &self,
        transport: &TransportId,
        bitrate: u32,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.take_failure("set_max_incoming_bitrate")?;

        let transport = state
            .transports
            .get_mut(transport)
            .ok_or_else(|| EngineError::new("set_max_incoming_bitrate", "transport closed"))?;
        transport.max_incoming_bitrate = Some(bitrate);
        Ok(())
    }

    async fn connect_transport(
        &self,
        transport: &TransportId,
        dtls_parameters: &DtlsParameters,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.take_failure("connect_transport")?;

        if dtls_parameters.fingerprints.is_empty() {
            return Err(EngineError::new("connect_transport", "missing DTLS fingerprint"));
        }

        let transport = state
            .transports
            .get_mut(transport)
            .ok_or_else(|| EngineError::new("connect_transport", "transport closed"))?;
        if transport.connected {
            return Err(EngineError::new("connect_transport", "connect() already called"));
        }
        transport.connected = true;
        Ok(())
    }

    async fn produce(
        &self,
        transport: &TransportId,
        kind: MediaKind,
        rtp_parameters: &RtpParameters,
    ) -> Result<ProducerId, EngineError> {
        let mut state = self.state.lock();
        state.take_failure("produce")?;

        let router = match state.transports.get(transport) {
            Some(t) if t.connected => t.router.clone(),
            Some(_) => return Err(EngineError::new("produce", "transport not connected")),
            None => return Err(EngineError::new("produce", "transport closed")),
        };

        if let Some(codec) = rtp_parameters.media_codec() {
            let supported = state.routers.get(&router).is_some_and(|(_, caps)| {
                caps.supports(kind, &codec.mime_type, codec.clock_rate, codec.channels)
            });
            if !supported {
                return Err(EngineError::new(
                    "produce",
                    format!("codec {} not supported by router", codec.mime_type),
                ));
            }
        }

        let id = ProducerId::random();
        state.producers.insert(
            id.clone(),
            MemoryProducer {
                transport: transport.clone(),
                router,
                kind,
                rtp_parameters: rtp_parameters.clone(),
            },
        );
        Ok(id)
    }

    fn can_consume(
        &self,
        router: &RouterId,
        producer: &ProducerId,
        rtp_capabilities: &RtpCapabilities,
    ) -> bool {
        let state = self.state.lock();
        let Some(producer) = state.producers.get(producer) else {
            return false;
        };
        if &producer.router != router {
            return false;
        }

        match producer.rtp_parameters.media_codec() {
            Some(codec) => rtp_capabilities.supports(
                producer.kind,
                &codec.mime_type,
                codec.clock_rate,
                codec.channels,
            ),
            None => rtp_capabilities.has_kind(producer.kind),
        }
    }

    async fn consume(
        &self,
        transport: &TransportId,
        options: &ConsumerOptions,
    ) -> Result<ConsumerInfo, EngineError> {
        let mut state = self.state.lock();
        state.take_failure("consume")?;

        match state.transports.get(transport) {
            Some(t) if t.connected => {}
            Some(_) => return Err(EngineError::new("consume", "transport not connected")),
            None => return Err(EngineError::new("consume", "transport closed")),
        }
        let producer = state
            .producers
            .get(&options.producer_id)
            .ok_or_else(|| EngineError::new("consume", "producer closed"))?;

        let kind = producer.kind;
        let rtp_parameters = RtpParameters {
            codecs: producer
                .rtp_parameters
                .codecs
                .iter()
                .filter(|c| {
                    c.is_rtx()
                        || options.rtp_capabilities.supports(
                            kind,
                            &c.mime_type,
                            c.clock_rate,
                            c.channels,
                        )
                })
                .cloned()
                .collect(),
            mid: Some(state.consumers.len().to_string()),
            ..producer.rtp_parameters.clone()
        };

        let id = ConsumerId::random();
        state.consumers.insert(
            id.clone(),
            MemoryConsumer {
                transport: transport.clone(),
                producer: options.producer_id.clone(),
                paused: options.paused,
                resume_count: 0,
            },
        );

        Ok(ConsumerInfo {
            id,
            producer_id: options.producer_id.clone(),
            kind,
            rtp_parameters,
            consumer_type: ConsumerType::Simple,
            producer_paused: false,
        })
    }

    async fn resume_consumer(&self, consumer: &ConsumerId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.take_failure("resume_consumer")?;

        let consumer = state
            .consumers
            .get_mut(consumer)
            .ok_or_else(|| EngineError::new("resume_consumer", "consumer closed"))?;
        if consumer.paused {
            consumer.paused = false;
            consumer.resume_count += 1;
        }
        Ok(())
    }

    async fn close_consumer(&self, consumer: &ConsumerId) {
        self.state.lock().consumers.remove(consumer);
    }

    async fn close_producer(&self, producer: &ProducerId) {
        self.state.lock().remove_producer(producer);
    }

    async fn close_transport(&self, transport: &TransportId) {
        let mut state = self.state.lock();
        if state.transports.remove(transport).is_none() {
            return;
        }

        let producers: Vec<ProducerId> = state
            .producers
            .iter()
            .filter(|(_, p)| &p.transport == transport)
            .map(|(id, _)| id.clone())
            .collect();
        for producer in producers {
            state.remove_producer(&producer);
        }
        state.remove_consumers_where(|c| &c.transport == transport);
    }

    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MediaEngineConfig;

    async fn router(engine: &MemoryEngine) -> RouterHandle {
        let config = MediaEngineConfig::default();
        let worker = engine.create_worker(&config.worker).await.unwrap();
        engine
            .create_router(&worker, &config.router.media_codecs)
            .await
            .unwrap()
    }

    fn dtls() -> DtlsParameters {
        DtlsParameters {
            role: Some(DtlsRole::Client),
            fingerprints: vec![DtlsFingerprint {
                algorithm: "sha-256".into(),
                value: "AB:CD".into(),
            }],
        }
    }

    fn vp8_parameters() -> RtpParameters {
        RtpParameters {
            codecs: vec![RtpCodecParameters {
                mime_type: "video/VP8".into(),
                payload_type: 101,
                clock_rate: 90000,
                channels: None,
                parameters: Default::default(),
                rtcp_feedback: Vec::new(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_router_assigns_payload_types() {
        let engine = MemoryEngine::new();
        let router = router(&engine).await;

        let codecs = &router.rtp_capabilities.codecs;
        assert_eq!(codecs[0].preferred_payload_type, Some(100));
        assert_eq!(codecs[1].preferred_payload_type, Some(101));
    }

    #[tokio::test]
    async fn test_transport_candidates_follow_options() {
        let engine = MemoryEngine::new();
        let router = router(&engine).await;
        let options = MediaEngineConfig::default().transport_options(true);

        let params = engine
            .create_webrtc_transport(&router.id, &options)
            .await
            .unwrap();

        assert_eq!(params.ice_candidates.len(), 1);
        assert_eq!(params.ice_candidates[0].protocol, Protocol::Tcp);
        assert_eq!(params.ice_candidates[0].port, 10000);
        assert_eq!(params.dtls_parameters.fingerprints.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_twice_fails() {
        let engine = MemoryEngine::new();
        let router = router(&engine).await;
        let options = MediaEngineConfig::default().transport_options(false);
        let params = engine
            .create_webrtc_transport(&router.id, &options)
            .await
            .unwrap();

        engine.connect_transport(&params.id, &dtls()).await.unwrap();
        assert!(engine.connect_transport(&params.id, &dtls()).await.is_err());
    }

    #[tokio::test]
    async fn test_close_transport_cascades() {
        let engine = MemoryEngine::new();
        let router = router(&engine).await;
        let options = MediaEngineConfig::default().transport_options(false);

        let send = engine.create_webrtc_transport(&router.id, &options).await.unwrap();
        let recv = engine.create_webrtc_transport(&router.id, &options).await.unwrap();
        engine.connect_transport(&send.id, &dtls()).await.unwrap();
        engine.connect_transport(&recv.id, &dtls()).await.unwrap();

        let producer = engine
            .produce(&send.id, MediaKind::Video, &vp8_parameters())
            .await
            .unwrap();
        let consumer = engine
            .consume(
                &recv.id,
                &ConsumerOptions {
                    producer_id: producer.clone(),
                    rtp_capabilities: router.rtp_capabilities.clone(),
                    paused: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(engine.consumer_paused(&consumer.id), Some(true));

        engine.close_transport(&send.id).await;

        assert_eq!(engine.producer_count(), 0);
        assert_eq!(engine.consumer_count(), 0);
        assert_eq!(engine.transport_count(), 1);
    }

    #[tokio::test]
    async fn test_can_consume_checks_codec() {
        let engine = MemoryEngine::new();
        let router = router(&engine).await;
        let options = MediaEngineConfig::default().transport_options(false);
        let send = engine.create_webrtc_transport(&router.id, &options).await.unwrap();
        engine.connect_transport(&send.id, &dtls()).await.unwrap();
        let producer = engine
            .produce(&send.id, MediaKind::Video, &vp8_parameters())
            .await
            .unwrap();

        let audio_only = RtpCapabilities {
            codecs: vec![RtpCodecCapability::opus()],
            header_extensions: Vec::new(),
        };

        assert!(engine.can_consume(&router.id, &producer, &router.rtp_capabilities));
        assert!(!engine.can_consume(&router.id, &producer, &audio_only));
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let engine = MemoryEngine::new();
        engine.fail_next("create_worker");

        let settings = WorkerSettings::default();
        assert!(engine.create_worker(&settings).await.is_err());
        assert!(engine.create_worker(&settings).await.is_ok());
    }

    #[tokio::test]
    async fn test_kill_worker_emits_event() {
        let engine = MemoryEngine::new();
        let mut events = engine.subscribe_events();
        let _ = router(&engine).await;

        engine.kill_worker();

        assert!(matches!(
            events.recv().await.unwrap(),
            EngineEvent::WorkerDied { .. }
        ));
        assert_eq!(engine.transport_count(), 0);
    }
}
