use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::accrual::preview_reward;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::constants::DEFAULT_RISK_TOLERANCE;
use crate::domain::{DepositPosition, RateSourceTag, Strategy};
use crate::scoring::RiskAnalysis;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioQuery {
    pub risk_tolerance: Option<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    #[serde(flatten)]
    pub position: DepositPosition,
    pub strategy_name: Option<String>,
    /// Rate the live figure is computed with
    pub rate_bps: Option<u32>,
    pub rate_source: Option<RateSourceTag>,
    pub stale: bool,
    /// Earned since the last checkpoint, not yet persisted
    pub pending_reward: Decimal,
    /// Persisted reward plus pending reward
    pub live_reward: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioResponse {
    pub owner_id: String,
    pub as_of: DateTime<Utc>,
    pub positions: Vec<PositionView>,
    pub total_principal: Decimal,
    pub total_accumulated_reward: Decimal,
    pub total_live_reward: Decimal,
    pub risk_analysis: RiskAnalysis,
}

fn position_view(position: DepositPosition, strategy: Option<&Strategy>, now: DateTime<Utc>) -> PositionView {
    let rate_bps = strategy.map(|s| s.rate_bps).or(position.last_rate_bps);
    let pending_reward = rate_bps
        .map(|rate| preview_reward(&position, rate, now))
        .unwrap_or(Decimal::ZERO);
    PositionView {
        strategy_name: strategy.map(|s| s.name.clone()),
        rate_bps,
        rate_source: strategy.map(|s| s.rate_source.clone()),
        stale: strategy.is_none_or(|s| s.rate_source.is_stale()),
        live_reward: position.accumulated_reward + pending_reward,
        pending_reward,
        position,
    }
}

pub async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
    Query(query): Query<PortfolioQuery>,
) -> ApiResult<Json<PortfolioResponse>> {
    let risk_tolerance = query.risk_tolerance.unwrap_or(DEFAULT_RISK_TOLERANCE);
    if !(1..=10).contains(&risk_tolerance) {
        return Err(ApiError::Validation(format!("riskTolerance {} not in 1..=10", risk_tolerance)));
    }

    let positions = state.owner_positions(&owner_id).await?;
    let strategies = state.strategies.load_strategies().await?;
    let by_id: HashMap<i32, &Strategy> = strategies.iter().map(|s| (s.id, s)).collect();
    let now = Utc::now();

    let risk_analysis = RiskAnalysis::analyze(&positions, &strategies, risk_tolerance);
    let views: Vec<PositionView> = positions
        .into_iter()
        .map(|p| {
            let strategy = by_id.get(&p.strategy_id).copied();
            position_view(p, strategy, now)
        })
        .collect();

    Ok(Json(PortfolioResponse {
        owner_id,
        as_of: now,
        total_principal: views.iter().map(|v| v.position.principal).sum(),
        total_accumulated_reward: views.iter().map(|v| v.position.accumulated_reward).sum(),
        total_live_reward: views.iter().map(|v| v.live_reward).sum(),
        positions: views,
        risk_analysis,
    }))
}
