//! Hardened Caching Image Proxy
//!
//! A production-ready image proxy built with Tokio and Axum. Fetches remote
//! images on behalf of browser clients that cannot make cross-origin
//! requests themselves, and serves repeat requests from an in-memory cache.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌────────────────────────────────────────────────┐
//!                       │                  IMAGE PROXY                    │
//!                       │                                                 │
//!   GET /?url=...       │  ┌──────────┐   ┌───────────┐   ┌───────────┐  │
//!   ────────────────────┼─▶│   http   │──▶│ security  │──▶│   cache   │  │
//!                       │  │  server  │   │ rl + url  │   │  lookup   │  │
//!                       │  └──────────┘   └───────────┘   └─────┬─────┘  │
//!                       │                                       │ miss   │
//!                       │                                       ▼        │
//!   image bytes         │  ┌──────────┐                  ┌───────────┐   │
//!   ◀───────────────────┼──│ response │◀─────────────────│ upstream  │◀──┼── Origin
//!                       │  │ assembly │                  │   fetch   │   │   Server
//!                       │  └──────────┘                  └───────────┘   │
//!                       │                                                 │
//!                       │  ┌────────────────────────────────────────────┐│
//!                       │  │           Cross-Cutting Concerns            ││
//!                       │  │  ┌────────┐ ┌─────────────┐ ┌────────────┐ ││
//!                       │  │  │ config │ │observability│ │ lifecycle  │ ││
//!                       │  │  └────────┘ └─────────────┘ └────────────┘ ││
//!                       │  └────────────────────────────────────────────┘│
//!                       └────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_proxy::config::loader::load_config;
use image_proxy::config::ProxyConfig;
use image_proxy::http::HttpServer;
use image_proxy::lifecycle::Shutdown;

#[derive(Parser)]
#[command(name = "image-proxy")]
#[command(about = "Hardened caching image proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Override the listener bind address from the config file.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("image-proxy v0.1.0 starting");

    let cli = Cli::parse();

    // Load configuration, falling back to defaults when no file is given
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_timeout_secs = config.upstream.timeout_secs,
        max_payload_bytes = config.upstream.max_payload_bytes,
        cache_ttl_secs = config.cache.ttl_secs,
        rate_limit = config.rate_limit.max_requests,
        rate_window_secs = config.rate_limit.window_secs,
        "Configuration loaded"
    );

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        address = %local_addr,
        "Listening for connections"
    );

    // Initialize metrics exporter
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            image_proxy::observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Create and run HTTP server
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
