//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::MediaEngineConfig;
use crate::protocol::constants::*;

/// Server configuration options
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// WebSocket path the signaling endpoint answers on
    pub path: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// How long to keep running after the media engine died
    pub engine_death_grace: Duration,

    /// Media engine settings
    pub engine: MediaEngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
            path: DEFAULT_SIGNALING_PATH.to_string(),
            max_connections: 0, // Unlimited
            engine_death_grace: ENGINE_DEATH_GRACE,
            engine: MediaEngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the signaling path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the grace period after engine death
    pub fn engine_death_grace(mut self, grace: Duration) -> Self {
        self.engine_death_grace = grace;
        self
    }

    /// Set the media engine configuration
    pub fn engine(mut self, engine: MediaEngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.path, "/server");
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.engine_death_grace, Duration::from_secs(2));
        assert_eq!(config.engine, MediaEngineConfig::default());
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:3001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.path, "/server");
    }

    #[test]
    fn test_builder_path_gets_leading_slash() {
        let config = ServerConfig::default().path("signal");
        assert_eq!(config.path, "/signal");

        let config = ServerConfig::default().path("/ws");
        assert_eq!(config.path, "/ws");
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8443".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .engine_death_grace(Duration::from_millis(500))
            .engine(MediaEngineConfig::default().port_range(20000, 20100));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.engine_death_grace, Duration::from_millis(500));
        assert_eq!(config.engine.worker.rtc_min_port, 20000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServerConfig = serde_json::from_str(
            r#"{"bindAddr": "127.0.0.1:4000", "maxConnections": 10}"#,
        )
        .unwrap();

        assert_eq!(config.bind_addr.port(), 4000);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.path, "/server");
        assert_eq!(config.engine_death_grace, Duration::from_secs(2));
    }
}
