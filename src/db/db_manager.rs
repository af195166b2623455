use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::warn;

use super::connection;
use super::schema;
use super::queries::{
    strategies as strategies_queries,
    deposit_positions as positions_queries,
};
use super::models::{
    strategies::NewStrategyModel,
    deposit_positions::{AccrualUpdateModel, DepositPositionModel},
};
use crate::domain::{DepositPosition, Strategy};
use crate::error::StoreError;
use crate::store::{DepositStore, StrategyStore};

/// Postgres-backed strategy and deposit store
pub struct DbManager {
    pub pool: PgPool,
}

impl DbManager {
    /// Creates a new database connection and initializes the schema
    pub async fn init(database_url: &str, statement_timeout: Duration) -> Result<Self, sqlx::Error> {
        let pool = connection::create_pool(database_url, statement_timeout).await?;

        // Ensure schema is initialized (creates tables if needed)
        schema::init_schema(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl StrategyStore for DbManager {
    async fn load_strategies(&self) -> Result<Vec<Strategy>, StoreError> {
        let rows = strategies_queries::get_all_strategies(&self.pool).await?;
        let mut strategies = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match Strategy::try_from(row) {
                Ok(strategy) => strategies.push(strategy),
                Err(e) => warn!(strategy_id = id, error = %e, "Skipping malformed strategy row"),
            }
        }
        Ok(strategies)
    }

    async fn upsert_strategy(&self, strategy: &Strategy) -> Result<(), StoreError> {
        let model = NewStrategyModel::try_from(strategy).map_err(|e| StoreError::Invalid(e.to_string()))?;
        strategies_queries::upsert_strategy(&self.pool, &model).await?;
        Ok(())
    }
}

#[async_trait]
impl DepositStore for DbManager {
    async fn load_open_positions(&self) -> Result<Vec<DepositPosition>, StoreError> {
        let rows = positions_queries::get_open_positions(&self.pool).await?;
        Ok(into_positions(rows))
    }

    async fn load_positions_for_owner(&self, owner_id: &str) -> Result<Vec<DepositPosition>, StoreError> {
        let rows = positions_queries::get_open_positions_for_owner(&self.pool, owner_id).await?;
        Ok(into_positions(rows))
    }

    async fn insert_position(&self, position: &DepositPosition) -> Result<(), StoreError> {
        position.validate().map_err(|e| StoreError::Invalid(e.to_string()))?;
        let model = DepositPositionModel {
            id: position.id,
            owner_id: position.owner_id.clone(),
            strategy_id: position.strategy_id,
            principal: position.principal,
            opened_at: position.opened_at,
            last_checkpoint: position.last_checkpoint,
            accumulated_reward: position.accumulated_reward,
            last_rate_bps: position.last_rate_bps.and_then(|r| i32::try_from(r).ok()),
            needs_review: position.needs_review,
            closed: position.closed,
        };
        positions_queries::insert_position(&self.pool, &model).await?;
        Ok(())
    }

    async fn update_accrual(&self, position: &DepositPosition) -> Result<(), StoreError> {
        let update = AccrualUpdateModel::from(position);
        let updated = positions_queries::update_accrual(&self.pool, &update).await?;
        if updated == 0 {
            return Err(StoreError::Rejected(format!(
                "position {} is closed or already checkpointed past {}",
                position.id, position.last_checkpoint
            )));
        }
        Ok(())
    }
}

// Malformed rows are computation-skipped rather than failing the whole load
fn into_positions(rows: Vec<DepositPositionModel>) -> Vec<DepositPosition> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            DepositPosition::try_from(row)
                .map_err(|e| warn!(position_id = id, error = %e, "Skipping malformed position row"))
                .ok()
        })
        .collect()
}
