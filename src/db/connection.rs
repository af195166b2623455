use sqlx::ConnectOptions;
use sqlx::postgres::{
    PgConnectOptions,
    PgPool,
    PgPoolOptions,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::log::LevelFilter;

pub async fn create_pool(database_url: &str, statement_timeout: Duration) -> Result<PgPool, sqlx::Error> {
    let connect_options = PgConnectOptions::from_str(database_url)?
        // Server-side bound on every statement issued by the core
        .options([("statement_timeout", format!("{}", statement_timeout.as_millis()))])
        .log_slow_statements(LevelFilter::Warn, Duration::from_secs(5));

    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(statement_timeout)
        .connect_with(connect_options)
        .await
}
