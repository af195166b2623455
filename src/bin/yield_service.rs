use dotenvy::dotenv;
use eyre::Result;
use tokio::sync::watch;
use tracing::{error, info};

use yield_rate_engine::api;
use yield_rate_engine::app;
use yield_rate_engine::config::Config;
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

    // Load configuration (reads .env when present)
    let cfg = Config::load()?;
    info!(
        database = cfg.database_url.is_some(),
        rate_sources = cfg.rate_endpoints.len(),
        bind_addr = %cfg.api_bind_addr,
        "Configuration loaded and logging initialized"
    );

    let services = app::build(&cfg).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = services.scheduler.spawn_workers(shutdown_rx.clone());
    let mut server = tokio::spawn(api::serve(services.state.clone(), cfg.api_bind_addr, shutdown_rx));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received");
        }
        result = &mut server => {
            // The server only returns early on a bind or accept failure
            error!("API server exited unexpectedly");
            result??;
        }
    }

    shutdown_tx.send(true).ok();
    for worker in workers {
        worker.await?;
    }
    if !server.is_finished() {
        server.await??;
    }
    info!("Service stopped");
    Ok(())
}
