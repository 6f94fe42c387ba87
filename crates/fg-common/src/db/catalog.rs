use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tokio_postgres::types::Json;
use tracing::{info, instrument};

use crate::catalog::{Catalog, CatalogError};
use crate::db::PgPool;
use crate::db::util::TimedClientExt;

pub const CATALOG_SNAPSHOT_KEY: &str = "catalog";

#[derive(Debug, Error)]
pub enum CatalogStorageError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("no catalog snapshot stored; run fg-catalog first")]
    Missing,
}

#[instrument(skip(pool))]
pub async fn load_catalog(pool: &PgPool) -> Result<Catalog, CatalogStorageError> {
    let client = pool.get().await?;
    let row = client
        .timed_query_opt(
            "SELECT payload FROM catalog_snapshot WHERE key = $1",
            &[&CATALOG_SNAPSHOT_KEY],
            "load_catalog",
        )
        .await?
        .ok_or(CatalogStorageError::Missing)?;

    let catalog = Catalog::from_snapshot(row.try_get("payload")?)?;
    if catalog.is_empty() {
        return Err(CatalogStorageError::Missing);
    }
    info!(
        items = catalog.item_count(),
        groups = catalog.group_count(),
        "catalog loaded"
    );
    Ok(catalog)
}

#[instrument(skip(pool, catalog), fields(items = catalog.item_count()))]
pub async fn save_catalog(pool: &PgPool, catalog: &Catalog) -> Result<(), CatalogStorageError> {
    let payload = catalog.to_snapshot()?;
    let client = pool.get().await?;
    client
        .timed_execute(
            "INSERT INTO catalog_snapshot (key, payload, updated_at)
             VALUES ($1, $2, NOW())
             ON CONFLICT (key) DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()",
            &[&CATALOG_SNAPSHOT_KEY, &Json(&payload)],
            "save_catalog",
        )
        .await?;
    Ok(())
}
