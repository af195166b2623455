use axum::Json;
use axum::extract::State;
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::domain::{RiskBand, Strategy, StrategyCategory};
use crate::scoring::{PerformanceSummary, summarize};

/// Strategy row with display annotations
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyView {
    #[serde(flatten)]
    pub strategy: Strategy,
    pub rate_formatted: String,
    pub risk_text: &'static str,
    pub risk_band: RiskBand,
    pub classification: StrategyCategory,
    /// Every rate source failed on the last sync
    pub stale: bool,
}

impl From<Strategy> for StrategyView {
    fn from(strategy: Strategy) -> Self {
        Self {
            rate_formatted: strategy.rate_formatted(),
            risk_text: strategy.risk_band().label(),
            risk_band: strategy.risk_band(),
            classification: strategy.classification(),
            stale: strategy.rate_source.is_stale(),
            strategy,
        }
    }
}

pub async fn list_strategies(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<StrategyView>>> {
    let mut strategies = state.strategies.load_strategies().await?;
    strategies.sort_by_key(|s| s.id);
    Ok(Json(strategies.into_iter().map(StrategyView::from).collect()))
}

pub async fn strategy_performance(State(state): State<Arc<AppState>>) -> ApiResult<Json<PerformanceSummary>> {
    let strategies = state.strategies.load_strategies().await?;
    Ok(Json(summarize(&strategies)))
}
