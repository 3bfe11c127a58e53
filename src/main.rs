//! ESI Proxy
//!
//! A reverse proxy that assembles pages from Edge Side Include fragments.
//!
//! # Architecture Overview
//!
//! ```text
//!                          ┌──────────────────────────────────────────────────┐
//!                          │                    ESI PROXY                      │
//!                          │                                                   │
//!   Client Request         │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!   ───────────────────────┼─▶│  server  │──▶│ gateway  │──▶│   routing   │   │
//!                          │  │ (axum)   │   │ (strip?) │   │ host→backend│   │
//!                          │  └──────────┘   └────┬─────┘   └──────┬──────┘   │
//!                          │                      │                │          │
//!                          │                      ▼                ▼          │
//!                          │               ┌─────────────┐  ┌────────────┐    │
//!                          │               │ esi engine  │◀─│   client   │◀───┼── Backend
//!                          │               │ rounds/tasks│─▶│ side-reqs  │────┼─▶
//!                          │               └─────────────┘  └────────────┘    │
//!   Client Response        │                      │                           │
//!   ◀──────────────────────┼──────────────────────┘                           │
//!                          │                                                   │
//!                          │  config · session · observability · lifecycle    │
//!                          └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use esi_proxy::config::load_config;
use esi_proxy::lifecycle::{listen_for_signals, Shutdown};
use esi_proxy::observability::{logging, metrics};
use esi_proxy::HttpServer;

/// ESI resolving reverse proxy.
#[derive(Debug, Parser)]
#[command(name = "esi-proxy", version, about)]
struct Args {
    /// Path to the configuration file (JSON, or TOML with a .toml extension).
    #[arg(short, long, default_value = "/etc/esi-proxy.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    logging::init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        "esi-proxy starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backend_mappings.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let server = HttpServer::new(config)?;
    let shutdown = Shutdown::new();
    tokio::spawn(listen_for_signals(shutdown.clone()));

    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
