use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::domain::{RecommendationResult, UserRiskProfile};
use crate::scoring::{RecommendationSource, ScoreMode};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub owner_id: String,
    pub intended_amount: Decimal,
    pub risk_tolerance: Option<u8>,
    #[serde(default)]
    pub mode: ScoreMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub owner_id: String,
    pub mode: ScoreMode,
    pub source: RecommendationSource,
    pub profile: UserRiskProfile,
    pub recommendations: Vec<RecommendationResult>,
    /// Strategies among the results whose rate could not be refreshed
    pub stale_strategy_ids: Vec<i32>,
}

#[instrument(skip_all)]
pub async fn create_recommendations(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> ApiResult<Json<RecommendationResponse>> {
    let Json(request) = payload?;
    if request.owner_id.trim().is_empty() {
        return Err(ApiError::Validation("ownerId must not be empty".to_string()));
    }
    if request.intended_amount <= Decimal::ZERO {
        return Err(ApiError::Validation("intendedAmount must be positive".to_string()));
    }

    let positions = state.owner_positions(&request.owner_id).await?;
    let strategies = state.strategies.load_strategies().await?;
    let profile = UserRiskProfile::derive(
        request.owner_id.clone(),
        request.risk_tolerance,
        request.intended_amount,
        &positions,
    )?;

    let out = state.recommender.recommend(&profile, &strategies, request.mode).await;
    debug!(owner_id = %request.owner_id, source = ?out.source, count = out.results.len(), "Scored strategies");

    let stale_strategy_ids = out
        .results
        .iter()
        .filter(|r| {
            strategies
                .iter()
                .any(|s| s.id == r.strategy_id && s.rate_source.is_stale())
        })
        .map(|r| r.strategy_id)
        .collect();

    Ok(Json(RecommendationResponse {
        owner_id: request.owner_id,
        mode: request.mode,
        source: out.source,
        profile,
        recommendations: out.results,
        stale_strategy_ids,
    }))
}
