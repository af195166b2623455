use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::domain::DepositPosition;
use crate::error::DomainError;

#[derive(Debug, FromRow)]
pub struct DepositPositionModel {
    pub id: i32,
    pub owner_id: String,
    pub strategy_id: i32,
    pub principal: Decimal,
    pub opened_at: DateTime<Utc>,
    pub last_checkpoint: DateTime<Utc>,
    pub accumulated_reward: Decimal,
    pub last_rate_bps: Option<i32>,
    pub needs_review: bool,
    pub closed: bool,
}

/// Reward fields written back by the accrual engine
#[derive(Debug)]
pub struct AccrualUpdateModel {
    pub id: i32,
    pub last_checkpoint: DateTime<Utc>,
    pub accumulated_reward: Decimal,
    pub last_rate_bps: Option<i32>,
    pub needs_review: bool,
}

impl TryFrom<DepositPositionModel> for DepositPosition {
    type Error = DomainError;

    fn try_from(row: DepositPositionModel) -> Result<Self, Self::Error> {
        let position = DepositPosition {
            id: row.id,
            owner_id: row.owner_id,
            strategy_id: row.strategy_id,
            principal: row.principal,
            opened_at: row.opened_at,
            last_checkpoint: row.last_checkpoint,
            accumulated_reward: row.accumulated_reward,
            last_rate_bps: row.last_rate_bps.and_then(|r| u32::try_from(r).ok()),
            needs_review: row.needs_review,
            closed: row.closed,
        };
        position.validate()?;
        Ok(position)
    }
}

impl From<&DepositPosition> for AccrualUpdateModel {
    fn from(position: &DepositPosition) -> Self {
        Self {
            id: position.id,
            last_checkpoint: position.last_checkpoint,
            accumulated_reward: position.accumulated_reward,
            last_rate_bps: position.last_rate_bps.and_then(|r| i32::try_from(r).ok()),
            needs_review: position.needs_review,
        }
    }
}
