use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::constants::{BPS_DENOMINATOR, SECONDS_PER_YEAR};
use crate::domain::DepositPosition;

/// Simple-interest reward over `elapsed_seconds` on a 365.25-day year:
///
/// `principal * rate_bps * elapsed / (31_557_600 * 10_000)`
///
/// Fractional seconds are credited exactly. `None` on negative inputs or
/// arithmetic overflow.
pub fn accrued_reward(principal: Decimal, rate_bps: u32, elapsed_seconds: Decimal) -> Option<Decimal> {
    if principal < Decimal::ZERO || elapsed_seconds < Decimal::ZERO {
        return None;
    }
    let denominator = Decimal::from(SECONDS_PER_YEAR).checked_mul(Decimal::from(BPS_DENOMINATOR))?;
    principal
        .checked_mul(Decimal::from(rate_bps))?
        .checked_mul(elapsed_seconds)?
        .checked_div(denominator)
}

/// Reward earned since the last checkpoint, as of `now`, without touching
/// the position. Zero when `now` is not after the checkpoint.
pub fn preview_reward(position: &DepositPosition, rate_bps: u32, now: DateTime<Utc>) -> Decimal {
    if position.closed {
        return Decimal::ZERO;
    }
    let elapsed = position.elapsed_seconds(now).unwrap_or_default().max(Decimal::ZERO);
    accrued_reward(position.principal, rate_bps, elapsed).unwrap_or(Decimal::ZERO)
}
