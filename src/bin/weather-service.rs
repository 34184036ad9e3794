//! Simulated flaky weather service.

use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;

use resilient_client::config::ObservabilityConfig;
use resilient_client::lifecycle::signals::shutdown_signal;
use resilient_client::observability::logging;
use resilient_client::upstream::{weather_router, RandomFailures};

#[derive(Parser)]
#[command(name = "weather-service")]
#[command(about = "Upstream stand-in that fails a share of requests with 5xx", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    bind: String,

    /// Fraction of requests answered with 500/502/503/504.
    #[arg(short, long, default_value_t = 0.5)]
    failure_ratio: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logging::init_logging(&ObservabilityConfig::default());

    let app = weather_router(Arc::new(RandomFailures::new(args.failure_ratio)));
    let listener = TcpListener::bind(&args.bind).await?;
    tracing::info!(address = %listener.local_addr()?, failure_ratio = args.failure_ratio, "Weather service running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
