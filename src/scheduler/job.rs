use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A unit of work the registry runs on a fixed interval
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    async fn run(&self) -> eyre::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobRunStatus {
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Started,
    /// Previous run still in flight
    Dropped,
}

/// Health snapshot of one job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub name: String,
    pub interval_secs: u64,
    pub running: bool,
    /// `None` until the first run starts
    pub last_status: Option<JobRunStatus>,
    pub last_run_started_at: Option<DateTime<Utc>>,
    pub last_run_finished_at: Option<DateTime<Utc>>,
    /// `None` until the interval worker is started
    pub next_run_eta: Option<DateTime<Utc>>,
    pub dropped_triggers: u64,
    pub run_count: u64,
    pub last_error: Option<String>,
}
