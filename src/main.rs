//! # Resource Broker
//!
//! Application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use resource_broker::config::Settings;
use resource_broker::domain::ResourceTable;
use resource_broker::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    resource_broker::telemetry::init_tracing();

    info!("Starting Resource Broker...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Resources are registered by embedding crates; the stock binary serves none
    let application = Application::build(settings, ResourceTable::new()).await?;

    info!(addr = %application.local_addr(), "Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
