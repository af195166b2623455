use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A user's principal allocated to one strategy.
///
/// Reward fields are only advanced by the accrual engine; `closed` is owned by
/// the external withdrawal flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositPosition {
    pub id: i32,
    pub owner_id: String,
    pub strategy_id: i32,
    pub principal: Decimal,
    pub opened_at: DateTime<Utc>,
    pub last_checkpoint: DateTime<Utc>,
    pub accumulated_reward: Decimal,
    /// Rate applied at the last accrual, used if the strategy row disappears
    pub last_rate_bps: Option<u32>,
    pub needs_review: bool,
    pub closed: bool,
}

impl DepositPosition {
    /// Freshly opened position, checkpointed at its opening time
    pub fn open(
        id: i32,
        owner_id: impl Into<String>,
        strategy_id: i32,
        principal: Decimal,
        opened_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let position = Self {
            id,
            owner_id: owner_id.into(),
            strategy_id,
            principal,
            opened_at,
            last_checkpoint: opened_at,
            accumulated_reward: Decimal::ZERO,
            last_rate_bps: None,
            needs_review: false,
            closed: false,
        };
        position.validate()?;
        Ok(position)
    }

    /// Restores an existing checkpoint (ledger import, persisted rows)
    pub fn with_checkpoint(
        mut self,
        last_checkpoint: DateTime<Utc>,
        accumulated_reward: Decimal,
    ) -> Result<Self, DomainError> {
        self.last_checkpoint = last_checkpoint;
        self.accumulated_reward = accumulated_reward;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.owner_id.trim().is_empty() {
            return Err(DomainError::Empty("owner id"));
        }
        if self.principal <= Decimal::ZERO {
            return Err(DomainError::OutOfRange {
                field: "principal",
                detail: format!("{} must be positive", self.principal),
            });
        }
        if self.accumulated_reward < Decimal::ZERO {
            return Err(DomainError::OutOfRange {
                field: "accumulated_reward",
                detail: format!("{} is negative", self.accumulated_reward),
            });
        }
        if self.last_checkpoint < self.opened_at {
            return Err(DomainError::CheckpointBeforeOpen);
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Signed seconds between the checkpoint and `now`, exact to the
    /// nanosecond. `None` if the span does not fit in `i64` nanoseconds.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> Option<Decimal> {
        (now - self.last_checkpoint)
            .num_nanoseconds()
            .map(|nanos| Decimal::new(nanos, 9))
    }
}
