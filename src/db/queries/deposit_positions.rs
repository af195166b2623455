use sqlx::PgPool;

use crate::db::models::deposit_positions::{AccrualUpdateModel, DepositPositionModel};

const POSITION_COLUMNS: &str = "id, owner_id, strategy_id, principal, opened_at, last_checkpoint, \
     accumulated_reward, last_rate_bps, needs_review, closed";

pub async fn get_open_positions(pool: &PgPool) -> Result<Vec<DepositPositionModel>, sqlx::Error> {
    sqlx::query_as::<_, DepositPositionModel>(&format!(
        "SELECT {POSITION_COLUMNS} FROM deposit_positions WHERE NOT closed ORDER BY id"
    ))
    .fetch_all(pool)
    .await
}

pub async fn get_open_positions_for_owner(
    pool: &PgPool,
    owner_id: &str,
) -> Result<Vec<DepositPositionModel>, sqlx::Error> {
    sqlx::query_as::<_, DepositPositionModel>(&format!(
        "SELECT {POSITION_COLUMNS} FROM deposit_positions WHERE owner_id = $1 AND NOT closed ORDER BY id"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Insert a position if not already present
pub async fn insert_position(pool: &PgPool, position: &DepositPositionModel) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO deposit_positions (id, owner_id, strategy_id, principal, opened_at, last_checkpoint,
                                       accumulated_reward, last_rate_bps, needs_review, closed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO NOTHING
        "#
    )
    .bind(position.id)
    .bind(&position.owner_id)
    .bind(position.strategy_id)
    .bind(position.principal)
    .bind(position.opened_at)
    .bind(position.last_checkpoint)
    .bind(position.accumulated_reward)
    .bind(position.last_rate_bps)
    .bind(position.needs_review)
    .bind(position.closed)
    .execute(pool)
    .await?;

    Ok(())
}

/// Advance the checkpoint of an open position. Returns the number of rows
/// updated; zero means the stored checkpoint was already later or the
/// position was closed in the meantime.
pub async fn update_accrual(pool: &PgPool, update: &AccrualUpdateModel) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE deposit_positions
        SET accumulated_reward = $2,
            last_checkpoint = $3,
            last_rate_bps = $4,
            needs_review = $5
        WHERE id = $1
          AND NOT closed
          AND last_checkpoint <= $3
          AND accumulated_reward <= $2
        "#
    )
    .bind(update.id)
    .bind(update.accumulated_reward)
    .bind(update.last_checkpoint)
    .bind(update.last_rate_bps)
    .bind(update.needs_review)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
