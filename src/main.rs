//! # Realtime Server
//!
//! Application entry point: initializes tracing, loads configuration, and
//! runs the coordination-layer server.

use anyhow::Result;
use tracing::info;

use realtime_server::config::Settings;
use realtime_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    realtime_server::telemetry::init_tracing();

    info!("Starting Realtime Server...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
