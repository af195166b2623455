use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::scheduler::{JobStatusView, TriggerOutcome};

pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, JobStatusView>> {
    Json(state.scheduler.status())
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub job: String,
    pub outcome: TriggerOutcome,
    pub status: JobStatusView,
}

/// Manual trigger. Subject to the same single-flight rule as the interval
/// workers, a busy job answers `dropped`.
pub async fn trigger_job(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let outcome = state.scheduler.trigger(&name)?;
    info!(job = %name, ?outcome, "Manual job trigger");
    let status = state.scheduler.job_status(&name)?;
    let code = match outcome {
        TriggerOutcome::Started => StatusCode::ACCEPTED,
        TriggerOutcome::Dropped => StatusCode::CONFLICT,
    };
    Ok((code, Json(TriggerResponse { job: name, outcome, status })))
}
