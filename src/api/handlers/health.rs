//! Health check handler.

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::state::AppState;
use crate::scheduler::{JobRunStatus, JobStatusView};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy", or "degraded" when a job's last run failed
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub jobs: BTreeMap<String, JobStatusView>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let jobs = state.scheduler.status();
    let degraded = jobs
        .values()
        .any(|job| job.last_status == Some(JobRunStatus::Failed));
    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        jobs,
    })
}
