use dotenvy::dotenv;
use eyre::{Result, eyre};
use tracing::info;

use yield_rate_engine::config::Config;
use yield_rate_engine::db::{connection, schema};
use yield_rate_engine::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    // Load configuration
    let cfg = Config::load()?;
    let database_url = cfg
        .database_url
        .as_deref()
        .ok_or_else(|| eyre!("DATABASE_URL must be set to initialize the schema"))?;
    info!("Configuration loaded and logging initialized");

    // Initialize database connection pool
    let pool = connection::create_pool(database_url, cfg.persist_timeout).await?;
    info!("Database connection pool created");

    // Initialize database schema
    schema::init_schema(&pool).await?;
    info!("Database schema initialized");

    tokio::time::sleep(std::time::Duration::from_secs(1)).await; // Allow time for logging to flush
    Ok(())
}
