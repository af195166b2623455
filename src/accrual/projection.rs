use rust_decimal::Decimal;
use serde::Serialize;

use super::formula::accrued_reward;
use crate::constants::SECONDS_PER_DAY;
use crate::domain::Strategy;

/// Reward a fresh deposit would earn at a strategy's current rate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardProjection {
    pub strategy_id: i32,
    pub amount: Decimal,
    pub rate_bps: u32,
    pub rate_formatted: String,
    pub duration_days: u32,
    pub projected_reward: Decimal,
    /// Rate could not be refreshed on the last sync
    pub stale: bool,
}

/// Same formula and year convention as scheduled accrual, over whole days.
/// `None` on a negative amount or overflow.
pub fn project_reward(strategy: &Strategy, amount: Decimal, duration_days: u32) -> Option<RewardProjection> {
    let elapsed = Decimal::from(duration_days).checked_mul(Decimal::from(SECONDS_PER_DAY))?;
    let projected_reward = accrued_reward(amount, strategy.rate_bps, elapsed)?;
    Some(RewardProjection {
        strategy_id: strategy.id,
        amount,
        rate_bps: strategy.rate_bps,
        rate_formatted: strategy.rate_formatted(),
        duration_days,
        projected_reward,
        stale: strategy.rate_source.is_stale(),
    })
}
