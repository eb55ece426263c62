//! movies-server
//!
//! Schema-validated REST API and WebSocket push channel on one port.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    MOVIES SERVER                      │
//!                      │                                                       │
//!   Client Request     │  ┌──────────┐   ┌──────────┐   ┌───────────────────┐ │
//!  ────────────────────┼─▶│ listener │──▶│  cors /  │──▶│ schema pipeline   │ │
//!                      │  │ (bound   │   │ sessions │   │ match → validate  │ │
//!                      │  │ at boot) │   └──────────┘   │ → dispatch        │ │
//!                      │  └──────────┘                  └─────────┬─────────┘ │
//!                      │                                          ▼           │
//!   Client Response    │                               ┌───────────────────┐  │
//!  ◀───────────────────┼───────────────────────────────│ controllers →     │  │
//!                      │                               │ services → cache  │  │
//!                      │                               └─────────┬─────────┘  │
//!                      │                                         │ publish    │
//!   Channel frames     │  ┌─────────────────────────┐            ▼            │
//!  ◀───────────────────┼──│ websocket writer tasks  │◀── connection registry  │
//!                      │  └─────────────────────────┘                         │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use movies_server::config::{self, ServerConfig};
use movies_server::lifecycle::{signals, Bootstrap, Shutdown};
use movies_server::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "movies-server")]
#[command(about = "Schema-validated REST API with a live push channel", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults apply when it does not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        ServerConfig::default()
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "movies-server starting");
    if !cli.config.exists() {
        tracing::warn!(path = %cli.config.display(), "Config file not found, using defaults");
    }

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

    let context = Bootstrap::standard().run(config).await?;
    tracing::info!(
        address = %context.local_addr()?,
        endpoint = %context.config.rest_endpoint(),
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(signals::wait_for_signal(shutdown));

    context.serve(receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
