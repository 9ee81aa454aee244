use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::DatabaseConfig;

/// Builds the connection pool without touching the network.
///
/// Connections are opened on first `acquire`, so the process can start (and
/// answer health checks) while the database is still unreachable.
pub fn connect_pool(cfg: &DatabaseConfig) -> PgPool {
    PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.op_timeout)
        .connect_lazy_with(cfg.connect_options())
}

/// Creates the `users` table when it does not exist yet.
pub async fn ensure_schema(db: &PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id         BIGSERIAL PRIMARY KEY,
            name       TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(db)
    .await
    .context("create users table")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS users_created_at_id_idx
            ON users (created_at DESC, id DESC)
        "#,
    )
    .execute(db)
    .await
    .context("create users ordering index")?;

    Ok(())
}
