use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::formula::accrued_reward;
use crate::domain::{DepositPosition, Strategy};
use crate::error::{CoreError, Degradation};
use crate::store::{DepositStore, PersistPolicy, StrategyStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccrualReport {
    pub as_of: DateTime<Utc>,
    pub accrued: Vec<i32>,
    /// Already checkpointed at `as_of`
    pub unchanged: Vec<i32>,
    /// Checkpoint later than `as_of`; left untouched
    pub rejected: Vec<i32>,
    /// Accrued against an inactive or missing strategy
    pub flagged: Vec<i32>,
    pub skipped: Vec<(i32, String)>,
    pub failed: Vec<(i32, String)>,
    pub total_reward: Decimal,
    pub degradations: Vec<Degradation>,
}

/// Result of advancing one position to `now`
#[derive(Debug, Clone, PartialEq)]
pub enum PositionOutcome {
    Accrued {
        position: DepositPosition,
        reward: Decimal,
        /// Strategy inactive or missing; rate taken from the last known value
        flagged: bool,
    },
    Unchanged,
    Rejected,
    Skipped(String),
}

/// Pure accrual step for a single position.
///
/// An active strategy supplies the rate. An inactive one still supplies its
/// last rate, and a missing one falls back to the rate recorded on the
/// position at its previous accrual; both mark the position for review.
pub fn accrue_position(position: &DepositPosition, strategy: Option<&Strategy>, now: DateTime<Utc>) -> PositionOutcome {
    let Some(elapsed) = position.elapsed_seconds(now) else {
        return PositionOutcome::Skipped("elapsed time out of range".to_string());
    };
    if elapsed < Decimal::ZERO {
        return PositionOutcome::Rejected;
    }
    if elapsed.is_zero() {
        return PositionOutcome::Unchanged;
    }

    let (rate_bps, flagged) = match (strategy, position.last_rate_bps) {
        (Some(strategy), _) => (strategy.rate_bps, !strategy.active),
        (None, Some(last_rate)) => (last_rate, true),
        (None, None) => {
            return PositionOutcome::Skipped(format!(
                "strategy {} not found and no prior rate recorded",
                position.strategy_id
            ));
        }
    };

    let Some(reward) = accrued_reward(position.principal, rate_bps, elapsed) else {
        return PositionOutcome::Skipped("reward computation overflowed".to_string());
    };
    let Some(accumulated_reward) = position.accumulated_reward.checked_add(reward) else {
        return PositionOutcome::Skipped("accumulated reward overflowed".to_string());
    };

    let mut next = position.clone();
    next.accumulated_reward = accumulated_reward;
    next.last_checkpoint = now;
    next.last_rate_bps = Some(rate_bps);
    next.needs_review = position.needs_review || flagged;
    PositionOutcome::Accrued { position: next, reward, flagged }
}

pub struct AccrualEngine {
    deposits: Arc<dyn DepositStore>,
    strategies: Arc<dyn StrategyStore>,
    persist: PersistPolicy,
}

impl AccrualEngine {
    pub fn new(deposits: Arc<dyn DepositStore>, strategies: Arc<dyn StrategyStore>, persist: PersistPolicy) -> Self {
        Self { deposits, strategies, persist }
    }

    /// Advances every open position to `now` and persists the changed rows.
    ///
    /// Calling twice with the same `now` is a no-op the second time. A `now`
    /// earlier than a stored checkpoint is rejected for that position.
    #[instrument(skip(self), fields(as_of = %now))]
    pub async fn accrue(&self, now: DateTime<Utc>) -> Result<AccrualReport, CoreError> {
        let strategies: HashMap<i32, Strategy> = self
            .strategies
            .load_strategies()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let positions = self.deposits.load_open_positions().await?;

        let outcomes: Vec<(i32, PositionOutcome)> = positions
            .par_iter()
            .map(|position| (position.id, accrue_position(position, strategies.get(&position.strategy_id), now)))
            .collect();

        let mut report = AccrualReport {
            as_of: now,
            accrued: Vec::new(),
            unchanged: Vec::new(),
            rejected: Vec::new(),
            flagged: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            total_reward: Decimal::ZERO,
            degradations: Vec::new(),
        };
        let mut rows = Vec::new();
        let mut rewards = HashMap::new();

        for (id, outcome) in outcomes {
            match outcome {
                PositionOutcome::Accrued { position, reward, flagged } => {
                    if flagged {
                        warn!(position_id = id, strategy_id = position.strategy_id, "Accrued against inactive or missing strategy");
                        report.flagged.push(id);
                    }
                    rewards.insert(id, reward);
                    rows.push(position);
                }
                PositionOutcome::Unchanged => report.unchanged.push(id),
                PositionOutcome::Rejected => {
                    warn!(position_id = id, "Checkpoint is later than accrual time, rejecting");
                    report.rejected.push(id);
                }
                PositionOutcome::Skipped(reason) => {
                    warn!(position_id = id, reason = %reason, "Skipping position");
                    report.degradations.push(Degradation::ComputationSkipped { position_id: id, reason: reason.clone() });
                    report.skipped.push((id, reason));
                }
            }
        }

        let write = self.deposits.update_accruals(&rows, &self.persist).await;
        if write.is_total_outage() {
            return Err(CoreError::PersistenceOutage {
                attempted: write.attempted,
                first_error: write.first_error(),
            });
        }
        for id in write.written {
            report.total_reward += rewards.get(&id).copied().unwrap_or_default();
            report.accrued.push(id);
        }
        for (id, reason) in write.failed {
            report.degradations.push(Degradation::PersistenceFailure { id, reason: reason.clone() });
            report.failed.push((id, reason));
        }
        report.flagged.retain(|id| report.accrued.contains(id));

        info!(
            accrued = report.accrued.len(),
            unchanged = report.unchanged.len(),
            rejected = report.rejected.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            total_reward = %report.total_reward,
            "Accrual run finished"
        );
        Ok(report)
    }
}
