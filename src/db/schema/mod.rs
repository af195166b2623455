use sqlx::{
    Executor,
    postgres::PgPool,
};

pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    pool.execute(include_str!("strategies.sql")).await?;
    pool.execute(include_str!("deposit_positions.sql")).await?;

    // Owner lookups back the portfolio and recommendation reads
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_deposit_positions_owner
        ON deposit_positions(owner_id) WHERE NOT closed;
        "#
    )
    .execute(pool)
    .await?;

    Ok(())
}
