use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

use crate::accrual::{RewardProjection, project_reward};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::constants::{DEFAULT_PROJECTION_DAYS, MAX_PROJECTION_DAYS};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionRequest {
    pub strategy_id: i32,
    pub amount: Decimal,
    pub duration_days: Option<u32>,
}

#[instrument(skip_all)]
pub async fn create_projection(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProjectionRequest>, JsonRejection>,
) -> ApiResult<Json<RewardProjection>> {
    let Json(request) = payload?;
    if request.amount <= Decimal::ZERO {
        return Err(ApiError::Validation("amount must be positive".to_string()));
    }
    let duration_days = request.duration_days.unwrap_or(DEFAULT_PROJECTION_DAYS);
    if !(1..=MAX_PROJECTION_DAYS).contains(&duration_days) {
        return Err(ApiError::Validation(format!(
            "durationDays must be between 1 and {}",
            MAX_PROJECTION_DAYS
        )));
    }

    let strategy = state
        .strategies
        .load_strategies()
        .await?
        .into_iter()
        .find(|s| s.id == request.strategy_id)
        .ok_or_else(|| ApiError::NotFound(format!("strategy {}", request.strategy_id)))?;

    project_reward(&strategy, request.amount, duration_days)
        .map(Json)
        .ok_or_else(|| ApiError::Validation("amount too large to project".to_string()))
}
