//! Signaling server listener
//!
//! Handles the TCP accept loop, upgrades each socket to a WebSocket and
//! spawns its connection loop.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::coordinator::SessionCoordinator;
use crate::engine::MediaEngine;
use crate::error::{Error, Result, SignalError};
use crate::protocol::Frame;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;
use crate::session::ConnectionId;

/// Peer served over in-memory frame channels
pub struct LocalConnection {
    pub id: ConnectionId,
    /// Frames to the server
    pub outbound: mpsc::UnboundedSender<Frame>,
    /// Frames from the server
    pub inbound: mpsc::UnboundedReceiver<Frame>,
}

/// Signaling server
pub struct SignalServer<E: MediaEngine> {
    config: ServerConfig,
    coordinator: Arc<SessionCoordinator<E>>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<E: MediaEngine> SignalServer<E> {
    /// Start the media engine and create the server
    ///
    /// Engine initialization failure is fatal and returned as
    /// `SignalError::EngineInit`.
    pub async fn start(config: ServerConfig, engine: Arc<E>) -> Result<Self> {
        let coordinator = SessionCoordinator::start(engine, config.engine.clone()).await?;

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            config,
            coordinator,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        })
    }

    /// Get a reference to the coordinator
    pub fn coordinator(&self) -> &Arc<SessionCoordinator<E>> {
        &self.coordinator
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server
    ///
    /// Returns only when the media engine dies, after the grace period.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(
            addr = %listener.local_addr()?,
            path = %self.config.path,
            "Signaling server listening"
        );

        let engine_watch = self.coordinator.spawn_engine_watch();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            _ = self.coordinator.engine_died() => {
                tracing::error!(
                    grace_ms = self.config.engine_death_grace.as_millis() as u64,
                    "Media engine died, shutting down"
                );
                tokio::time::sleep(self.config.engine_death_grace).await;
                Err(Error::Signal(SignalError::EngineUnavailable))
            }
            result = self.accept_loop(&listener) => result,
        };

        engine_watch.abort();

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let id = self.next_id();

        tracing::debug!(
            connection_id = id.0,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
        }

        let path = self.config.path.clone();
        let coordinator = Arc::clone(&self.coordinator);

        tokio::spawn(async move {
            if let Err(e) = serve_websocket(id, socket, peer_addr, path, coordinator, permit).await {
                tracing::debug!(
                    connection_id = id.0,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(connection_id = id.0, "Connection closed");
        });
    }

    /// Register a peer that talks over in-memory channels
    ///
    /// The peer is registered (and caught up) before this returns.
    pub async fn connect_in_process(&self) -> Result<LocalConnection> {
        let id = self.next_id();
        let connection = Connection::open(id, None, Arc::clone(&self.coordinator)).await?;

        let (outbound, server_inbound) = mpsc::unbounded_channel();
        let (server_outbound, inbound) = mpsc::unbounded_channel();
        tokio::spawn(connection.run(server_inbound, server_outbound));

        Ok(LocalConnection {
            id,
            outbound,
            inbound,
        })
    }

    fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

/// Upgrade one socket and run its connection loop
async fn serve_websocket<E: MediaEngine>(
    id: ConnectionId,
    socket: TcpStream,
    peer_addr: SocketAddr,
    path: String,
    coordinator: Arc<SessionCoordinator<E>>,
    _permit: Option<OwnedSemaphorePermit>,
) -> Result<()> {
    let check_path = |request: &Request, response: Response| {
        if request.uri().path() == path {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("Not Found".to_string()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    };
    let ws_stream = tokio_tungstenite::accept_hdr_async(socket, check_path).await?;

    let connection = Connection::open(id, Some(peer_addr), coordinator).await?;
    tracing::info!(connection_id = id.0, peer = %peer_addr, "WebSocket connected");

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();

    // Drains until every sender is gone, including handlers still in flight
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let text = match frame.to_text() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode frame");
                    continue;
                }
            };
            if let Err(e) = ws_tx.send(Message::Text(text)).await {
                tracing::debug!(error = %e, "WebSocket write failed");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader = async move {
        while let Some(message) = ws_rx.next().await {
            match message {
                Ok(Message::Text(text)) => match Frame::parse(&text) {
                    Ok(frame) => {
                        if in_tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(connection_id = id.0, error = %e, "Dropping malformed frame");
                    }
                },
                Ok(Message::Close(_)) => break,
                // Pings are answered by tungstenite
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(connection_id = id.0, error = %e, "WebSocket read failed");
                    break;
                }
            }
        }
    };

    tokio::join!(connection.run(in_rx, out_tx), reader);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::MemoryEngine;
    use crate::protocol::EventEnvelope;

    #[tokio::test]
    async fn test_connection_ids_increase() {
        let server = SignalServer::start(ServerConfig::default(), Arc::new(MemoryEngine::new()))
            .await
            .unwrap();

        let a = server.connect_in_process().await.unwrap();
        let b = server.connect_in_process().await.unwrap();

        assert!(b.id.0 > a.id.0);
        assert_eq!(server.coordinator().connection_count().await, 2);
    }

    #[tokio::test]
    async fn test_engine_init_failure_is_fatal() {
        let engine = Arc::new(MemoryEngine::new());
        engine.fail_next("create_worker");

        let result = SignalServer::start(ServerConfig::default(), engine).await;
        assert!(matches!(
            result,
            Err(Error::Signal(SignalError::EngineInit(_)))
        ));
    }

    #[tokio::test]
    async fn test_engine_death_stops_server() {
        let config = ServerConfig::default().engine_death_grace(Duration::from_millis(10));
        let server = SignalServer::start(config, Arc::new(MemoryEngine::new()))
            .await
            .unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let engine = Arc::clone(server.coordinator().engine());

        let (result, _) = tokio::join!(
            server.serve(listener, std::future::pending::<()>()),
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                engine.kill_worker();
            }
        );

        assert!(matches!(
            result,
            Err(Error::Signal(SignalError::EngineUnavailable))
        ));
    }

    #[tokio::test]
    async fn test_websocket_roundtrip() {
        let server = Arc::new(
            SignalServer::start(ServerConfig::default(), Arc::new(MemoryEngine::new()))
                .await
                .unwrap(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let serving = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .serve(listener, async {
                        let _ = stop_rx.await;
                    })
                    .await
            })
        };

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/server", addr))
            .await
            .unwrap();
        let request = Frame::Event(EventEnvelope::request(
            "getRouterRtpCapabilities",
            serde_json::Value::Null,
            1,
        ));
        ws.send(Message::Text(request.to_text().unwrap())).await.unwrap();

        let reply = loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => break Frame::parse(&text).unwrap(),
                _ => continue,
            }
        };
        match reply {
            Frame::Ack(ack) => {
                assert_eq!(ack.ack, 1);
                assert!(ack.error.is_none());
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        let _ = stop_tx.send(());
        serving.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wrong_path_is_refused() {
        let server = Arc::new(
            SignalServer::start(ServerConfig::default(), Arc::new(MemoryEngine::new()))
                .await
                .unwrap(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let serving = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.serve(listener, std::future::pending::<()>()).await })
        };

        let result = tokio_tungstenite::connect_async(format!("ws://{}/other", addr)).await;
        assert!(result.is_err());
        assert_eq!(server.coordinator().connection_count().await, 0);

        serving.abort();
    }
}
