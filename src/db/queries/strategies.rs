use sqlx::PgPool;

use crate::db::models::strategies::{NewStrategyModel, StrategyModel};

/// Fetch every strategy row, active or not
pub async fn get_all_strategies(pool: &PgPool) -> Result<Vec<StrategyModel>, sqlx::Error> {
    sqlx::query_as::<_, StrategyModel>(
        r#"
        SELECT id, name, category, rate_bps, risk_level, min_amount, max_amount,
               active, rate_source, rate_updated_at
        FROM strategies
        ORDER BY id
        "#
    )
    .fetch_all(pool)
    .await
}

/// Insert a strategy or replace every column of an existing one in a single statement
pub async fn upsert_strategy(pool: &PgPool, strategy: &NewStrategyModel) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO strategies (id, name, category, rate_bps, risk_level, min_amount, max_amount,
                                active, rate_source, rate_updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            category = EXCLUDED.category,
            rate_bps = EXCLUDED.rate_bps,
            risk_level = EXCLUDED.risk_level,
            min_amount = EXCLUDED.min_amount,
            max_amount = EXCLUDED.max_amount,
            active = EXCLUDED.active,
            rate_source = EXCLUDED.rate_source,
            rate_updated_at = EXCLUDED.rate_updated_at
        "#
    )
    .bind(strategy.id)
    .bind(&strategy.name)
    .bind(&strategy.category)
    .bind(strategy.rate_bps)
    .bind(strategy.risk_level)
    .bind(strategy.min_amount)
    .bind(strategy.max_amount)
    .bind(strategy.active)
    .bind(&strategy.rate_source)
    .bind(strategy.rate_updated_at)
    .execute(pool)
    .await?;

    Ok(())
}
