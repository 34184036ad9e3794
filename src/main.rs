//! Resilient client service.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │               RESILIENT CLIENT                 │
//!     Client Request      │  ┌─────────┐    ┌──────────────────────────┐  │
//!     ────────────────────┼─▶│  http   │───▶│ resilience::ResilientCall│  │
//!                         │  │ server  │    │  retry | circuit-breaker │  │
//!                         │  └─────────┘    └────────────┬─────────────┘  │
//!                         │                              │                │
//!                         │                              ▼                │
//!     Client Response     │  ┌─────────┐    ┌──────────────────────────┐  │
//!     ◀───────────────────┼──│response │◀───│ transport (reqwest)      │◀─┼──── Upstream
//!                         │  │ mapping │    │ per-call timeout         │  │     Service
//!                         │  └─────────┘    └──────────────────────────┘  │
//!                         │                                               │
//!                         │  config · observability · lifecycle           │
//!                         └───────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use resilient_client::config::{load_config, validate_config, ClientConfig, Strategy};
use resilient_client::observability::{logging, metrics};
use resilient_client::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "resilient-client")]
#[command(about = "HTTP service that calls a flaky upstream through retries or a circuit breaker", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the strategy (retry | circuit-breaker).
    #[arg(short, long)]
    strategy: Option<Strategy>,

    /// Override the upstream URL.
    #[arg(short, long)]
    upstream_url: Option<String>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(url) = args.upstream_url {
        config.upstream.url = url;
    }
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }
    validate_config(&config).map_err(|errors| {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    })?;

    logging::init_logging(&config.observability);
    tracing::info!("resilient-client v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        strategy = %config.strategy,
        max_attempts = config.retries.max_attempts,
        failure_threshold = config.circuit_breaker.failure_threshold,
        reset_timeout_secs = config.circuit_breaker.reset_timeout_secs,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
