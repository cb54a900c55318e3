//! Signaling server over the in-memory media engine
//!
//! Run with: cargo run --example loopback_server [BIND_ADDR] [CONFIG_JSON]
//!
//! Examples:
//!   cargo run --example loopback_server                      # binds to 0.0.0.0:3000
//!   cargo run --example loopback_server 127.0.0.1:3001       # binds to 127.0.0.1:3001
//!   cargo run --example loopback_server 0.0.0.0:3000 server.json
//!
//! `CONFIG_JSON` is a `ServerConfig` in camelCase JSON; missing fields keep
//! their defaults. A bind address on the command line wins over the file.
//!
//! An in-process peer publishes a VP8 stream right after startup, so any
//! WebSocket client connecting to `ws://<addr>/server` receives
//! `newProducer` and can run the subscribe flow:
//!
//!   getRouterRtpCapabilities → createConsumerTransport →
//!   connectConsumerTransport → consume → resume

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::json;
use sfu_signal::client::SignalClient;
use sfu_signal::engine::{
    DtlsFingerprint, DtlsParameters, DtlsRole, MediaKind, MemoryEngine, RtpCodecParameters,
    RtpParameters,
};
use sfu_signal::protocol::CreateTransportRequest;
use sfu_signal::server::{ServerConfig, SignalServer};

fn print_usage() {
    eprintln!("Usage: loopback_server [BIND_ADDR] [CONFIG_JSON]");
    eprintln!();
    eprintln!("  BIND_ADDR    host:port to listen on (default 0.0.0.0:3000)");
    eprintln!("  CONFIG_JSON  path to a ServerConfig JSON file");
}

fn load_config(args: &[String]) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = match args.get(2) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ServerConfig::default(),
    };

    if let Some(addr) = args.get(1) {
        let addr: SocketAddr = addr.parse()?;
        config = config.bind(addr);
    }

    Ok(config)
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
        encodings: vec![json!({ "ssrc": 1111 })],
        ..Default::default()
    }
}

/// Publish a stream from an in-process peer
async fn publish_loopback(client: &SignalClient) -> sfu_signal::Result<()> {
    let caps = client.get_router_rtp_capabilities().await?;
    let transport = client
        .create_producer_transport(CreateTransportRequest {
            force_tcp: false,
            rtp_capabilities: Some(caps),
        })
        .await?;

    client
        .connect_producer_transport(
            None,
            DtlsParameters {
                role: Some(DtlsRole::Server),
                fingerprints: vec![DtlsFingerprint {
                    algorithm: "sha-256".into(),
                    value: "AB:CD:EF".into(),
                }],
            },
        )
        .await?;

    let producer_id = client
        .produce(transport.id, MediaKind::Video, vp8_parameters())
        .await?;
    tracing::info!(producer_id = %producer_id, "Loopback stream published");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sfu_signal=debug".parse()?)
                .add_directive("loopback_server=debug".parse()?),
        )
        .init();

    println!("Starting signaling server on ws://{}{}", config.bind_addr, config.path);

    let server = Arc::new(SignalServer::start(config, Arc::new(MemoryEngine::new())).await?);

    let local = server.connect_in_process().await?;
    let (publisher, _notifications) = SignalClient::local(local);
    publish_loopback(&publisher).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
