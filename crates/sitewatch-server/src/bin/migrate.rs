//! Applies the sitewatch database schema

use sitewatch_server::{Config, PgStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    if config.logging.is_json() {
        common::logging::init_json();
    } else {
        common::logging::init();
    }

    tracing::info!(
        host = %config.database.host,
        database = %config.database.name,
        "Running database migrations"
    );

    let store = PgStore::connect(&config.database).await?;
    let result = store.migrate().await;
    store.close().await;
    result?;

    Ok(())
}
