//! Session coordinator implementation
//!
//! Owns the producer slot, the transport registry and the consumer map, and
//! mediates every signaling operation between peers and the media engine.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Instant;

use tokio::sync::{broadcast, watch, Mutex};

use super::broadcast::{Broadcaster, NotificationSink};
use super::entry::{ConsumerEntry, CoordinatorStats, ProducerEntry};
use crate::capabilities::CapabilityRegistry;
use crate::engine::{
    ConsumerId, ConsumerOptions, DtlsParameters, EngineEvent, MediaEngine, MediaEngineConfig,
    MediaKind, ProducerId, RtpCapabilities, RtpParameters, TransportId, TransportParams,
};
use crate::error::SignalError;
use crate::protocol::{ConsumerClosedReason, ConsumerDescriptor, Notification};
use crate::session::{
    Binding, ConnectionId, ConnectionState, Transport, TransportRole, TransportState,
};

/// Options of a `create*Transport` request
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Offer TCP candidates only
    pub force_tcp: bool,
    /// Capabilities of the peer's device, if it sent them
    pub rtp_capabilities: Option<RtpCapabilities>,
}

/// Engine objects to close once the state lock is released
#[derive(Debug, Default)]
struct Teardown {
    consumers: Vec<ConsumerId>,
    producers: Vec<ProducerId>,
    transports: Vec<TransportId>,
}

impl Teardown {
    fn is_empty(&self) -> bool {
        self.consumers.is_empty() && self.producers.is_empty() && self.transports.is_empty()
    }

    async fn apply<E: MediaEngine>(self, engine: &E) {
        for id in &self.consumers {
            engine.close_consumer(id).await;
        }
        for id in &self.producers {
            engine.close_producer(id).await;
        }
        for id in &self.transports {
            engine.close_transport(id).await;
        }
    }
}

#[derive(Default)]
struct CoordinatorState {
    connections: HashMap<ConnectionId, ConnectionState>,
    transports: HashMap<TransportId, Transport>,
    producer: Option<ProducerEntry>,
    consumers: HashMap<ConsumerId, ConsumerEntry>,
    broadcaster: Broadcaster,
}

impl CoordinatorState {
    fn require_connection(&self, conn: ConnectionId) -> Result<&ConnectionState, SignalError> {
        self.connections
            .get(&conn)
            .ok_or(SignalError::UnknownConnection(conn))
    }

    /// Find the caller's transport of `role`, by id or as its latest one
    fn resolve_transport(
        &self,
        conn: ConnectionId,
        role: TransportRole,
        requested: Option<&TransportId>,
    ) -> Result<TransportId, SignalError> {
        let connection = self.require_connection(conn)?;
        let id = match requested {
            Some(id) => id.clone(),
            None => connection
                .latest_transport(role)
                .cloned()
                .ok_or(SignalError::UnknownTransport(None))?,
        };

        let transport = self
            .transports
            .get(&id)
            .filter(|t| t.owner == conn)
            .ok_or_else(|| SignalError::UnknownTransport(Some(id.clone())))?;
        if transport.role != role {
            return Err(SignalError::WrongRole {
                transport: id,
                expected: role,
            });
        }
        Ok(id)
    }

    fn transport(&self, id: &TransportId) -> Result<&Transport, SignalError> {
        self.transports
            .get(id)
            .ok_or_else(|| SignalError::UnknownTransport(Some(id.clone())))
    }

    /// Apply `f` to a transport and report any state change to its owner
    fn update_transport<R>(
        &mut self,
        id: &TransportId,
        f: impl FnOnce(&mut Transport) -> Result<R, SignalError>,
    ) -> Result<R, SignalError> {
        let transport = self
            .transports
            .get_mut(id)
            .ok_or_else(|| SignalError::UnknownTransport(Some(id.clone())))?;
        let before = transport.state();
        let result = f(transport);

        if transport.state() != before {
            self.broadcaster.notify(
                transport.owner,
                Notification::TransportStateChange {
                    transport_id: transport.id.clone(),
                    state: transport.state(),
                },
            );
        }
        result
    }

    /// Destroy the producer and every consumer depending on it
    fn retire_producer(
        &mut self,
        producer: ProducerEntry,
        reason: ConsumerClosedReason,
        teardown: &mut Teardown,
    ) {
        if let Some(transport) = self.transports.get_mut(&producer.transport_id) {
            transport.unbind(&Binding::Producer(producer.id.clone()));
        }

        let dependents: Vec<ConsumerId> = self
            .consumers
            .values()
            .filter(|c| c.producer_id == producer.id)
            .map(|c| c.id.clone())
            .collect();
        for consumer_id in &dependents {
            self.drop_consumer(consumer_id, reason, teardown);
        }

        tracing::info!(
            producer_id = %producer.id,
            owner = producer.owner.0,
            consumers = dependents.len(),
            reason = ?reason,
            "Producer closed"
        );
        teardown.producers.push(producer.id);
    }

    /// Tear down one consumer and tell its owner
    ///
    /// The subscribe transport keeps its state and becomes free for a new
    /// consume call.
    fn drop_consumer(
        &mut self,
        consumer_id: &ConsumerId,
        reason: ConsumerClosedReason,
        teardown: &mut Teardown,
    ) {
        let Some(consumer) = self.consumers.remove(consumer_id) else {
            return;
        };
        if let Some(transport) = self.transports.get_mut(&consumer.transport_id) {
            transport.unbind(&Binding::Consumer(consumer.id.clone()));
        }

        self.broadcaster.notify(
            consumer.owner,
            Notification::ConsumerClosed {
                consumer_id: consumer.id.clone(),
                reason,
            },
        );
        tracing::debug!(
            consumer_id = %consumer.id,
            owner = consumer.owner.0,
            "Consumer closed"
        );
        teardown.consumers.push(consumer.id);
    }

    /// Engine-reported failure: mark Failed and release what it carried
    fn fail_transport(&mut self, id: &TransportId, teardown: &mut Teardown) -> bool {
        let binding = match self.update_transport(id, |t| {
            if t.state().is_terminal() {
                Err(SignalError::TransportClosed(t.id.clone()))
            } else {
                Ok(t.fail())
            }
        }) {
            Ok(binding) => binding,
            Err(_) => return false,
        };
        teardown.transports.push(id.clone());

        match binding {
            Some(Binding::Producer(producer_id)) => {
                let current = self
                    .producer
                    .as_ref()
                    .is_some_and(|p| p.id == producer_id);
                match self.producer.take() {
                    Some(entry) if current => {
                        self.retire_producer(entry, ConsumerClosedReason::TransportFailed, teardown)
                    }
                    other => {
                        self.producer = other;
                        teardown.producers.push(producer_id);
                    }
                }
            }
            Some(Binding::Consumer(consumer_id)) => {
                self.drop_consumer(&consumer_id, ConsumerClosedReason::TransportFailed, teardown)
            }
            Some(Binding::PendingConsumer) | None => {}
        }
        true
    }

    /// Remove a connection and everything it owns
    fn remove_connection(
        &mut self,
        conn: ConnectionId,
        teardown: &mut Teardown,
    ) -> Option<ConnectionState> {
        let connection = self.connections.remove(&conn)?;
        self.broadcaster.unregister(conn);

        if self.producer.as_ref().is_some_and(|p| p.owner == conn) {
            if let Some(producer) = self.producer.take() {
                self.retire_producer(producer, ConsumerClosedReason::ProducerClosed, teardown);
            }
        }

        for id in connection.transports() {
            let Some(mut transport) = self.transports.remove(id) else {
                continue;
            };
            match transport.close() {
                Some(Binding::Consumer(consumer_id)) => {
                    if self.consumers.remove(&consumer_id).is_some() {
                        teardown.consumers.push(consumer_id);
                    }
                }
                Some(Binding::Producer(producer_id)) => {
                    if !teardown.producers.contains(&producer_id) {
                        teardown.producers.push(producer_id);
                    }
                }
                Some(Binding::PendingConsumer) | None => {}
            }
            teardown.transports.push(id.clone());
        }

        Some(connection)
    }
}

/// Process-wide signaling coordinator
///
/// Built once per process and shared as `Arc<SessionCoordinator<E>>`. All
/// registries sit behind one mutex that is never held across an engine call;
/// each operation re-checks its preconditions after every engine await, so a
/// disconnect racing a publish or consume cannot leave engine objects behind.
pub struct SessionCoordinator<E: MediaEngine> {
    engine: Arc<E>,
    config: MediaEngineConfig,
    capabilities: CapabilityRegistry,
    state: Mutex<CoordinatorState>,
    engine_alive: watch::Sender<bool>,
}

impl<E: MediaEngine> SessionCoordinator<E> {
    /// Start the media engine and build the coordinator
    ///
    /// Fails with `EngineInit` when the worker or router cannot be created.
    pub async fn start(engine: Arc<E>, config: MediaEngineConfig) -> Result<Arc<Self>, SignalError> {
        let capabilities = CapabilityRegistry::new();
        capabilities.initialize(&*engine, &config).await?;

        let (engine_alive, _) = watch::channel(true);

        Ok(Arc::new(Self {
            engine,
            config,
            capabilities,
            state: Mutex::new(CoordinatorState::default()),
            engine_alive,
        }))
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn config(&self) -> &MediaEngineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    fn ensure_available(&self) -> Result<(), SignalError> {
        if self.capabilities.is_poisoned() {
            Err(SignalError::EngineUnavailable)
        } else {
            Ok(())
        }
    }

    /// Register a new connection and its notification sink
    ///
    /// A connection registering while a producer exists is told about it
    /// right away.
    pub async fn register_connection(
        &self,
        conn: ConnectionId,
        peer_addr: Option<SocketAddr>,
        sink: NotificationSink,
    ) -> Result<(), SignalError> {
        self.ensure_available()?;
        let mut state = self.state.lock().await;

        state
            .connections
            .insert(conn, ConnectionState::new(conn, peer_addr));
        state.broadcaster.register(conn, sink);

        let caught_up = state.producer.is_some() && state.broadcaster.announce_to(conn);

        tracing::info!(
            connection_id = conn.0,
            peer = ?peer_addr,
            connections = state.connections.len(),
            caught_up = caught_up,
            "Connection registered"
        );
        Ok(())
    }

    /// Router capabilities
    pub async fn get_capabilities(
        &self,
        conn: ConnectionId,
    ) -> Result<Arc<RtpCapabilities>, SignalError> {
        self.ensure_available()?;
        self.state.lock().await.require_connection(conn)?;
        self.capabilities.get()
    }

    /// Allocate a publish transport for `conn`
    pub async fn create_publish_transport(
        &self,
        conn: ConnectionId,
        options: TransportOptions,
    ) -> Result<TransportParams, SignalError> {
        self.create_transport(conn, TransportRole::Publish, options)
            .await
    }

    /// Allocate a subscribe transport for `conn`
    pub async fn create_subscribe_transport(
        &self,
        conn: ConnectionId,
        options: TransportOptions,
    ) -> Result<TransportParams, SignalError> {
        self.create_transport(conn, TransportRole::Subscribe, options)
            .await
    }

    async fn create_transport(
        &self,
        conn: ConnectionId,
        role: TransportRole,
        options: TransportOptions,
    ) -> Result<TransportParams, SignalError> {
        self.ensure_available()?;
        let router_id = self.capabilities.context()?.router_id.clone();
        self.state.lock().await.require_connection(conn)?;

        let transport_options = self.config.transport_options(options.force_tcp);
        let params = self
            .engine
            .create_webrtc_transport(&router_id, &transport_options)
            .await?;

        if let Some(bitrate) = self.config.webrtc_transport.max_incoming_bitrate {
            if let Err(e) = self.engine.set_max_incoming_bitrate(&params.id, bitrate).await {
                tracing::debug!(
                    transport_id = %params.id,
                    error = %e,
                    "Ignoring max incoming bitrate failure"
                );
            }
        }

        let mut state = self.state.lock().await;
        let Some(connection) = state.connections.get_mut(&conn) else {
            drop(state);
            self.engine.close_transport(&params.id).await;
            return Err(SignalError::UnknownConnection(conn));
        };

        connection.track_transport(role, params.id.clone());
        if options.rtp_capabilities.is_some() {
            connection.device_capabilities = options.rtp_capabilities;
        }
        state.transports.insert(
            params.id.clone(),
            Transport::new(params.id.clone(), role, conn),
        );

        tracing::info!(
            connection_id = conn.0,
            transport_id = %params.id,
            role = %role,
            force_tcp = options.force_tcp,
            "Transport created"
        );
        Ok(params)
    }

    /// Submit the peer's DTLS parameters for one of its transports
    ///
    /// `transport_id` may be omitted, in which case the caller's most recent
    /// transport of `role` is used. Succeeds at most once per transport.
    pub async fn connect_transport(
        &self,
        conn: ConnectionId,
        role: TransportRole,
        transport_id: Option<&TransportId>,
        dtls_parameters: &DtlsParameters,
    ) -> Result<(), SignalError> {
        self.ensure_available()?;

        let id = {
            let mut state = self.state.lock().await;
            let id = state.resolve_transport(conn, role, transport_id)?;
            state.update_transport(&id, Transport::begin_connect)?;
            id
        };

        let result = self.engine.connect_transport(&id, dtls_parameters).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(()) => {
                state.update_transport(&id, Transport::complete_connect)?;
                tracing::info!(
                    connection_id = conn.0,
                    transport_id = %id,
                    role = %role,
                    "Transport connected"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = conn.0,
                    transport_id = %id,
                    error = %e,
                    "Transport connect failed"
                );
                let mut teardown = Teardown::default();
                state.fail_transport(&id, &mut teardown);
                drop(state);
                teardown.apply(&*self.engine).await;
                Err(SignalError::EngineCall(e))
            }
        }
    }

    /// Publish the process-wide stream on a connected publish transport
    ///
    /// An existing producer is replaced: it is closed and each of its
    /// consumers is torn down with a `consumerClosed` notification. Every
    /// other connection then receives `newProducer`.
    pub async fn publish(
        &self,
        conn: ConnectionId,
        transport_id: &TransportId,
        kind: MediaKind,
        rtp_parameters: RtpParameters,
    ) -> Result<ProducerId, SignalError> {
        self.ensure_available()?;

        {
            let state = self.state.lock().await;
            let id = state.resolve_transport(conn, TransportRole::Publish, Some(transport_id))?;
            state.transport(&id)?.require_ready(TransportRole::Publish)?;
        }

        let producer_id = self
            .engine
            .produce(transport_id, kind, &rtp_parameters)
            .await?;

        let mut state = self.state.lock().await;

        // The connection may have gone away, or the transport failed, while
        // the engine call was outstanding
        let still_ready = state
            .resolve_transport(conn, TransportRole::Publish, Some(transport_id))
            .and_then(|id| state.transport(&id)?.require_ready(TransportRole::Publish));
        if let Err(e) = still_ready {
            drop(state);
            self.engine.close_producer(&producer_id).await;
            return Err(e);
        }

        let mut teardown = Teardown::default();
        if let Some(previous) = state.producer.take() {
            tracing::info!(
                previous = %previous.id,
                producer_id = %producer_id,
                "Replacing producer"
            );
            state.retire_producer(previous, ConsumerClosedReason::ProducerReplaced, &mut teardown);
        }

        if let Some(stale) = state.update_transport(transport_id, |t| t.bind_producer(producer_id.clone()))? {
            if !teardown.producers.contains(&stale) {
                teardown.producers.push(stale);
            }
        }
        state.producer = Some(ProducerEntry {
            id: producer_id.clone(),
            transport_id: transport_id.clone(),
            owner: conn,
            kind,
            rtp_parameters,
            created_at: Instant::now(),
        });

        let notified = state.broadcaster.announce_publisher_available(conn);
        tracing::info!(
            connection_id = conn.0,
            producer_id = %producer_id,
            kind = %kind,
            notified = notified,
            "Producer published"
        );

        drop(state);
        if !teardown.is_empty() {
            teardown.apply(&*self.engine).await;
        }
        Ok(producer_id)
    }

    /// Create a consumer of the current producer on a subscribe transport
    ///
    /// `rtp_capabilities` defaults to the capabilities the peer declared when
    /// creating a transport. Video consumers are created paused.
    pub async fn consume(
        &self,
        conn: ConnectionId,
        transport_id: Option<&TransportId>,
        rtp_capabilities: Option<RtpCapabilities>,
    ) -> Result<ConsumerDescriptor, SignalError> {
        self.ensure_available()?;
        let router_id = self.capabilities.context()?.router_id.clone();

        let (id, producer, rtp_capabilities) = {
            let mut state = self.state.lock().await;
            let connection = state.require_connection(conn)?;
            let rtp_capabilities = rtp_capabilities.or_else(|| connection.device_capabilities.clone());

            let producer = state.producer.clone().ok_or(SignalError::NoProducer)?;
            let id = state.resolve_transport(conn, TransportRole::Subscribe, transport_id)?;

            let transport = state.transport(&id)?;
            transport.require_ready(TransportRole::Subscribe)?;
            if transport.binding().is_some() {
                return Err(SignalError::AlreadyConsuming(id));
            }

            let rtp_capabilities = rtp_capabilities.ok_or(SignalError::IncompatibleCapabilities)?;
            if !self
                .engine
                .can_consume(&router_id, &producer.id, &rtp_capabilities)
            {
                tracing::warn!(
                    connection_id = conn.0,
                    producer_id = %producer.id,
                    "Cannot consume: incompatible capabilities"
                );
                return Err(SignalError::IncompatibleCapabilities);
            }

            state.update_transport(&id, Transport::reserve_consumer)?;
            (id, producer, rtp_capabilities)
        };

        let paused = producer.kind == MediaKind::Video;
        let options = ConsumerOptions {
            producer_id: producer.id.clone(),
            rtp_capabilities,
            paused,
        };
        let result = self.engine.consume(&id, &options).await;

        let mut state = self.state.lock().await;
        let info = match result {
            Ok(info) => info,
            Err(e) => {
                if let Some(transport) = state.transports.get_mut(&id) {
                    transport.release_reservation();
                }
                tracing::warn!(
                    connection_id = conn.0,
                    transport_id = %id,
                    error = %e,
                    "Consume failed"
                );
                return Err(SignalError::EngineCall(e));
            }
        };

        // The producer may have been replaced or closed meanwhile
        let bound = if state.producer.as_ref().is_some_and(|p| p.id == info.producer_id) {
            state.update_transport(&id, |t| t.bind_consumer(info.id.clone()))
        } else {
            Err(SignalError::NoProducer)
        };
        if let Err(e) = bound {
            if let Some(transport) = state.transports.get_mut(&id) {
                transport.release_reservation();
            }
            drop(state);
            self.engine.close_consumer(&info.id).await;
            return Err(e);
        }

        state.consumers.insert(
            info.id.clone(),
            ConsumerEntry {
                id: info.id.clone(),
                producer_id: info.producer_id.clone(),
                transport_id: id.clone(),
                owner: conn,
                kind: info.kind,
                paused,
            },
        );

        tracing::info!(
            connection_id = conn.0,
            consumer_id = %info.id,
            producer_id = %info.producer_id,
            kind = %info.kind,
            paused = paused,
            "Consumer created"
        );
        Ok(ConsumerDescriptor::new(info, paused))
    }

    /// Unpause the caller's video consumers
    ///
    /// Sent once the subscriber is ready to render, so the key frame the
    /// engine requests on resume is not wasted. A no-op for audio producers
    /// and for consumers already running.
    pub async fn resume_consumption(&self, conn: ConnectionId) -> Result<(), SignalError> {
        self.ensure_available()?;

        let paused: Vec<ConsumerId> = {
            let state = self.state.lock().await;
            state.require_connection(conn)?;

            match &state.producer {
                Some(producer) if producer.kind == MediaKind::Video => {}
                _ => return Ok(()),
            }
            state
                .consumers
                .values()
                .filter(|c| c.owner == conn && c.paused && c.kind == MediaKind::Video)
                .map(|c| c.id.clone())
                .collect()
        };

        if paused.is_empty() {
            tracing::debug!(connection_id = conn.0, "Nothing to resume");
            return Ok(());
        }

        let mut resumed = Vec::with_capacity(paused.len());
        let mut failure = None;
        for consumer_id in paused {
            match self.engine.resume_consumer(&consumer_id).await {
                Ok(()) => resumed.push(consumer_id),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // Record what the engine actually resumed, even on a partial failure
        let mut state = self.state.lock().await;
        for consumer_id in &resumed {
            if let Some(consumer) = state.consumers.get_mut(consumer_id) {
                consumer.paused = false;
            }
        }
        drop(state);

        if let Some(e) = failure {
            tracing::warn!(
                connection_id = conn.0,
                resumed = resumed.len(),
                error = %e,
                "Resume failed"
            );
            return Err(SignalError::EngineCall(e));
        }

        tracing::info!(
            connection_id = conn.0,
            consumers = resumed.len(),
            "Consumers resumed"
        );
        Ok(())
    }

    /// Tear down everything a connection owns
    ///
    /// If it owned the producer, every dependent consumer on other
    /// connections is closed and its owner notified.
    pub async fn on_disconnect(&self, conn: ConnectionId) {
        let mut teardown = Teardown::default();
        let removed = {
            let mut state = self.state.lock().await;
            state.remove_connection(conn, &mut teardown)
        };

        let Some(connection) = removed else {
            return;
        };

        tracing::info!(
            connection_id = conn.0,
            transports = connection.transport_count(),
            consumers = teardown.consumers.len(),
            duration_ms = connection.duration().as_millis() as u64,
            "Connection closed"
        );

        // Nothing left to release in a dead engine
        if !self.capabilities.is_poisoned() {
            teardown.apply(&*self.engine).await;
        }
    }

    /// React to an out-of-band engine event
    pub async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::WorkerDied { worker_id } => {
                tracing::error!(
                    worker = %worker_id,
                    "Media engine worker died, refusing further signaling"
                );
                self.capabilities.poison();
                self.engine_alive.send_replace(false);
            }
            EngineEvent::TransportFailed { transport_id } => {
                let mut teardown = Teardown::default();
                let failed = {
                    let mut state = self.state.lock().await;
                    state.fail_transport(&transport_id, &mut teardown)
                };
                if failed {
                    tracing::warn!(transport_id = %transport_id, "Transport failed");
                    teardown.apply(&*self.engine).await;
                }
            }
        }
    }

    /// Spawn the task that forwards engine events to the coordinator
    ///
    /// The task holds only a weak reference and stops once the coordinator is
    /// dropped or the engine's event stream ends.
    pub fn spawn_engine_watch(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let mut events = self.engine.subscribe_events();
        let coordinator: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match coordinator.upgrade() {
                        Some(coordinator) => coordinator.handle_engine_event(event).await,
                        None => break,
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped = skipped, "Engine events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Resolves once the engine has been reported dead
    pub async fn engine_died(&self) {
        let mut alive = self.engine_alive.subscribe();
        loop {
            if !*alive.borrow_and_update() {
                return;
            }
            if alive.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Whether a producer is live
    pub async fn has_producer(&self) -> bool {
        self.state.lock().await.producer.is_some()
    }

    /// Current producer ID
    pub async fn producer_id(&self) -> Option<ProducerId> {
        self.state.lock().await.producer.as_ref().map(|p| p.id.clone())
    }

    /// Lifecycle state of a transport
    pub async fn transport_state(&self, id: &TransportId) -> Option<TransportState> {
        self.state.lock().await.transports.get(id).map(Transport::state)
    }

    /// Pause flags of a connection's consumers
    pub async fn consumers_of(&self, conn: ConnectionId) -> Vec<(ConsumerId, bool)> {
        self.state
            .lock()
            .await
            .consumers
            .values()
            .filter(|c| c.owner == conn)
            .map(|c| (c.id.clone(), c.paused))
            .collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    /// Snapshot of coordinator state
    pub async fn stats(&self) -> CoordinatorStats {
        let state = self.state.lock().await;
        CoordinatorStats {
            connections: state.connections.len(),
            transports: state.transports.len(),
            has_producer: state.producer.is_some(),
            consumers: state.consumers.len(),
        }
    }
}
