//! Sitewatch server binary

use sitewatch_server::{Config, SitewatchServer, setup_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tracing is not initialized until the configuration is known
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Flushes pending spans on drop
    let _telemetry_guard = setup_tracing(&config)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Sitewatch starting");

    if let Err(e) = SitewatchServer::new(config).run().await {
        tracing::error!(error = %e, "Sitewatch failed to start");
        return Err(e.into());
    }

    Ok(())
}
