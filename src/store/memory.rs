use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{DepositStore, StrategyStore};
use crate::domain::{DepositPosition, Strategy};
use crate::error::StoreError;

/// Process-local store, used when no database is configured
#[derive(Debug, Default)]
pub struct MemoryStore {
    strategies: RwLock<BTreeMap<i32, Strategy>>,
    positions: RwLock<BTreeMap<i32, DepositPosition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Withdrawal hook for the external collaborator (and tests)
    pub async fn close_position(&self, id: i32) -> bool {
        match self.positions.write().await.get_mut(&id) {
            Some(position) => {
                position.closed = true;
                true
            }
            None => false,
        }
    }

    pub async fn position(&self, id: i32) -> Option<DepositPosition> {
        self.positions.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl StrategyStore for MemoryStore {
    async fn load_strategies(&self) -> Result<Vec<Strategy>, StoreError> {
        Ok(self.strategies.read().await.values().cloned().collect())
    }

    async fn upsert_strategy(&self, strategy: &Strategy) -> Result<(), StoreError> {
        strategy.validate().map_err(|e| StoreError::Invalid(e.to_string()))?;
        self.strategies.write().await.insert(strategy.id, strategy.clone());
        Ok(())
    }
}

#[async_trait]
impl DepositStore for MemoryStore {
    async fn load_open_positions(&self) -> Result<Vec<DepositPosition>, StoreError> {
        Ok(self
            .positions
            .read()
            .await
            .values()
            .filter(|p| p.is_open())
            .cloned()
            .collect())
    }

    async fn load_positions_for_owner(&self, owner_id: &str) -> Result<Vec<DepositPosition>, StoreError> {
        Ok(self
            .positions
            .read()
            .await
            .values()
            .filter(|p| p.is_open() && p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn insert_position(&self, position: &DepositPosition) -> Result<(), StoreError> {
        position.validate().map_err(|e| StoreError::Invalid(e.to_string()))?;
        if !self.strategies.read().await.contains_key(&position.strategy_id) {
            return Err(StoreError::Invalid(format!(
                "position {} references unknown strategy {}",
                position.id, position.strategy_id
            )));
        }
        self.positions
            .write()
            .await
            .entry(position.id)
            .or_insert_with(|| position.clone());
        Ok(())
    }

    async fn update_accrual(&self, position: &DepositPosition) -> Result<(), StoreError> {
        let mut positions = self.positions.write().await;
        let stored = positions
            .get_mut(&position.id)
            .ok_or_else(|| StoreError::Rejected(format!("position {} not found", position.id)))?;
        if stored.closed {
            return Err(StoreError::Rejected(format!("position {} is closed", position.id)));
        }
        if stored.last_checkpoint > position.last_checkpoint
            || stored.accumulated_reward > position.accumulated_reward
        {
            return Err(StoreError::Rejected(format!(
                "position {} already checkpointed at {}",
                position.id, stored.last_checkpoint
            )));
        }
        stored.accumulated_reward = position.accumulated_reward;
        stored.last_checkpoint = position.last_checkpoint;
        stored.last_rate_bps = position.last_rate_bps;
        stored.needs_review = position.needs_review;
        Ok(())
    }
}
