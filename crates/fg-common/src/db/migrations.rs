use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::PgPool;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "killmail, hash and fit relations",
        sql: r#"
CREATE TABLE IF NOT EXISTS killmail (
    id BIGINT PRIMARY KEY,
    raw_killmail JSONB NOT NULL,
    raw_valuation JSONB,
    state SMALLINT NOT NULL DEFAULT 0 CHECK (state BETWEEN 0 AND 2)
);

CREATE INDEX IF NOT EXISTS idx_killmail_pending
    ON killmail (state)
    WHERE state < 2;

CREATE TABLE IF NOT EXISTS hash (
    id BIGINT PRIMARY KEY,
    hash TEXT NOT NULL,
    state SMALLINT NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS fit (
    killmail_id BIGINT PRIMARY KEY,
    ship_id INTEGER NOT NULL,
    cost BIGINT,
    solar_system_id INTEGER NOT NULL,
    hi INTEGER[] NOT NULL,
    med INTEGER[] NOT NULL,
    low INTEGER[] NOT NULL,
    rig INTEGER[] NOT NULL,
    sub INTEGER[] NOT NULL,
    all_items INTEGER[] NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fit_ship ON fit (ship_id);
CREATE INDEX IF NOT EXISTS idx_fit_hi ON fit USING GIN (hi);
CREATE INDEX IF NOT EXISTS idx_fit_med ON fit USING GIN (med);
CREATE INDEX IF NOT EXISTS idx_fit_low ON fit USING GIN (low);
CREATE INDEX IF NOT EXISTS idx_fit_rig ON fit USING GIN (rig);
CREATE INDEX IF NOT EXISTS idx_fit_sub ON fit USING GIN (sub);
CREATE INDEX IF NOT EXISTS idx_fit_all_items ON fit USING GIN (all_items);
"#,
    },
    Migration {
        id: 2,
        description: "catalog snapshot",
        sql: r#"
CREATE TABLE IF NOT EXISTS catalog_snapshot (
    key TEXT PRIMARY KEY,
    payload JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#,
    },
];

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .try_get(0)?;
        if applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(id = migration.id, description = migration.description, "applied migration");
    }

    Ok(())
}
