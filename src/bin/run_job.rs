use dotenvy::dotenv;
use eyre::{Result, eyre};
use tracing::info;

use yield_rate_engine::app;
use yield_rate_engine::config::Config;
use yield_rate_engine::logging;
use yield_rate_engine::scheduler::JobRunStatus;

/// Runs one registered job to completion and prints its status as JSON.
/// Usage: run_job <rate_sync|accrual>
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Config::load()?;
    let services = app::build(&cfg).await?;

    let Some(job) = std::env::args().nth(1) else {
        return Err(eyre!(
            "usage: run_job <job>; registered jobs: {}",
            services.scheduler.job_names().join(", ")
        ));
    };

    let outcome = services.scheduler.run_once(&job).await?;
    let status = services.scheduler.job_status(&job)?;
    info!(job = %job, ?outcome, last_status = ?status.last_status, "Job finished");
    println!("{}", serde_json::to_string_pretty(&status)?);

    if status.last_status == Some(JobRunStatus::Failed) {
        return Err(eyre!("job {} failed: {}", job, status.last_error.unwrap_or_default()));
    }
    Ok(())
}
