//! speedtest-engine: network throughput and latency test server
//!
//! Endpoints:
//! - `/download`: streams random bytes, by byte count or for a duration
//! - `/upload`: drains the request body and reports success
//! - `/ping`: WebSocket echo for round-trip timing
//!
//! Configuration via CLI arguments, the `PORT` environment variable, or a
//! TOML file.

mod config;
mod cors;
mod handlers;
mod router;
mod server;

use config::Config;
use server::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        max_connections = config.max_connections,
        max_upload_size = ?config.max_upload_size,
        "Starting speedtest-engine server"
    );

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "Failed to bind listener");
            std::process::exit(1);
        }
    };

    server.run().await
}
