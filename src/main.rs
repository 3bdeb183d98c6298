//! Image proxy server (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────────┐
//!                 │                      IMAGE PROXY                          │
//!                 │                                                           │
//!  GET ?url=...   │  ┌────────┐   ┌────────┐   ┌─────────┐   ┌────────────┐  │
//!  ───────────────┼─▶│ target │──▶│ guard  │──▶│ primary │──▶│ image/html │  │
//!                 │  │ parse  │   │ (SSRF) │   │  fetch  │   │  classify  │  │
//!                 │  └────────┘   └────────┘   └─────────┘   └─────┬──────┘  │
//!                 │                                   html │       │ image   │
//!                 │                    ┌────────────┐◀─────┘       │         │
//!                 │                    │  extract + │              │         │
//!                 │                    │  secondary │──────┐       │         │
//!                 │                    └────────────┘      ▼       ▼         │
//!  image bytes    │                                  ┌──────────────────┐    │
//!  ◀──────────────┼──────────────────────────────────│ stream responder │    │
//!                 │                                  └──────────────────┘    │
//!                 └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use image_proxy::lifecycle::startup::load_startup_config;
use image_proxy::observability::{logging, metrics};
use image_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "image-proxy")]
#[command(about = "Resolve remote image URLs safely and stream them back", long_about = None)]
struct Args {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_startup_config(args.config.as_deref(), args.bind)?;

    logging::init_logging(&config.observability);

    tracing::info!("image-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_image_bytes = config.fetch.max_image_bytes,
        enforce_stream_limit = config.fetch.enforce_stream_limit,
        extended_ranges = config.security.extended_ranges,
        guard_redirects = config.security.guard_redirects,
        verify_resolved_addresses = config.security.verify_resolved_addresses,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let _signal_task = shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
