//! Extensible HTTP host (v1)
//!
//! Loads the HTTP server extension, mounts the status page and serves
//! until a shutdown signal arrives or the listener fails for good.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                  HTTP HOST                   │
//!                        │                                              │
//!     Client Request     │  ┌──────────┐   ┌──────────┐   ┌───────────┐ │
//!     ───────────────────┼─▶│   net    │──▶│  http    │──▶│  routing  │ │
//!                        │  │ listener │   │  server  │   │  router   │ │
//!                        │  └──────────┘   └──────────┘   └─────┬─────┘ │
//!                        │                                      │       │
//!                        │              ┌───────────────────────┤       │
//!                        │              ▼                       ▼       │
//!                        │       ┌─────────────┐        ┌────────────┐  │
//!                        │       │ mount table │        │ index heap │  │
//!                        │       │ → sub-app   │        │ → redirect │  │
//!                        │       └─────────────┘        └────────────┘  │
//!                        │                                              │
//!                        │  ┌────────────────────────────────────────┐  │
//!                        │  │          Cross-Cutting Concerns        │  │
//!                        │  │  config · observability · lifecycle    │  │
//!                        │  │  resilience (retry + back-off)         │  │
//!                        │  └────────────────────────────────────────┘  │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use http_host::admin;
use http_host::config::{load_config, validate_config, ConfigError, HostConfig};
use http_host::extension::{Extension, HttpServerExtension};
use http_host::lifecycle::{signals, Shutdown};
use http_host::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "http-host", version, about = "Extensible HTTP host")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `http_server.host`.
    #[arg(long)]
    host: Option<String>,

    /// Override `http_server.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override `observability.log_level`.
    #[arg(long)]
    log_level: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<HostConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => HostConfig::default(),
    };

    if let Some(host) = &cli.host {
        config.http_server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.http_server.port = Some(port);
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init(&config.observability.log_level);
    tracing::info!("http-host v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut extension = HttpServerExtension::new(config.ports.clone());
    let handle = extension.load(config.http_server.clone())?;

    let status_page = if config.admin.enabled {
        Some(admin::mount_status(&handle, &config.admin)?)
    } else {
        None
    };

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let stop = {
        let shutdown = shutdown;
        tokio::spawn(async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        })
    };

    let result = extension.run(signal).await;

    stop.abort();
    drop(status_page);
    extension.unload();

    match result {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "HTTP server failed");
            Err(e.into())
        }
    }
}
