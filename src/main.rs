//! Circuit-breaking HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌──────────────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ http::server ──▶ resilience::retries               │
//!                           │                      │        ▲                      │
//!                           │                      ▼        │ success / failure    │
//!                           │            load_balancer::registry (breaker state)   │
//!                           │                      │        ▲                      │
//!                           │                      ▼        │                      │
//!     Client Response       │            resilience::forwarder ──────────────────┼──▶ Upstreams
//!     ◀─────────────────────┼── headers sanitized + x-lb-upstream                 │
//!                           │                               ▲                      │
//!                           │            health::prober ────┘ (periodic probes)   │
//!                           └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use circuit_balancer::config::{load_config, BalancerConfig};
use circuit_balancer::observability::{logging, metrics};
use circuit_balancer::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "circuit-balancer")]
#[command(about = "Round-robin HTTP load balancer with per-upstream circuit breaking", long_about = None)]
struct Args {
    /// TOML configuration file. Without it, defaults plus LB_* environment variables are used.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => BalancerConfig::from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!("circuit-balancer v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstreams = ?config.upstreams.0,
        fail_threshold = config.breaker.fail_threshold,
        cooldown_ms = config.breaker.cooldown_ms,
        max_attempts = config.retries.max_attempts,
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
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let _signals = shutdown.trigger_on_signal();

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
