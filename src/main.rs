//! relay-proxy
//!
//! Transparent reverse proxy for one fixed upstream host, speaking both plain
//! HTTP and WebSocket.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 RELAY PROXY                  │
//!                        │                                              │
//!   Client Request       │  ┌─────────┐    ┌────────────┐               │
//!   ─────────────────────┼─▶│   net   │───▶│ classifier │               │
//!                        │  │listener │    └─────┬──────┘               │
//!                        │  └─────────┘          │                      │
//!                        │          ┌────────────┴────────────┐         │
//!                        │          ▼                         ▼         │
//!                        │   ┌─────────────┐          ┌──────────────┐  │
//!                        │   │ HTTP relay  │          │  WebSocket   │  │
//!                        │   │ (reqwest,   │          │  relay       │  │
//!                        │   │  streamed)  │          │  (sessions)  │  │
//!                        │   └──────┬──────┘          └──────┬───────┘  │
//!                        │          │   https://host/...     │ wss://host/...
//!                        └──────────┼────────────────────────┼──────────┘
//!                                   ▼                        ▼
//!                                        Upstream host
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use relay_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use relay_proxy::http::HttpServer;
use relay_proxy::lifecycle::{signals, Shutdown};
use relay_proxy::net;
use relay_proxy::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "relay-proxy", version)]
#[command(about = "Relay HTTP and WebSocket traffic to a single upstream host", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,

    /// Upstream host[:port], overrides `upstream.host`
    #[arg(short, long)]
    upstream: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(upstream) = &cli.upstream {
        config.upstream.host = upstream.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init_logging(&config.observability);
    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.host,
        upstream_tls = config.upstream.tls,
        listener_tls = config.listener.tls.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let tls = config.listener.tls.clone();
    let server = HttpServer::new(config)?;
    match tls {
        Some(tls) => {
            let addr = net::listener::bind_address(&server.config().listener)?;
            let rustls = net::tls::load_tls_config(&tls).await?;
            server.run_tls(addr, rustls, shutdown.subscribe()).await?;
        }
        None => {
            let listener = net::listener::bind(&server.config().listener).await?;
            server.run(listener, shutdown.subscribe()).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
