use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::Parser;
use dotenvy::dotenv;
use fg_common::catalog::{Catalog, CatalogError};
use fg_common::db::{
    CatalogStorageError, DbPoolError, MigrationError, create_pool_from_url, run_migrations,
    save_catalog,
};
use fg_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use tracing::info;

const GROUPS_FILE: &str = "groupIDs.yaml";
const TYPES_FILE: &str = "typeIDs.yaml";

#[derive(Debug, Parser)]
#[command(
    name = "fg-catalog",
    about = "Load the static item catalog into the database"
)]
struct Cli {
    /// Directory holding groupIDs.yaml and typeIDs.yaml
    #[arg(long, env = "FG_SDE_DIR", default_value = "sde/fsd")]
    sde_dir: PathBuf,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Parse and report counts without writing the snapshot
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("database pool error: {0}")]
    DbPool(#[from] DbPoolError),
    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),
    #[error("failed to store catalog: {0}")]
    Storage(#[from] CatalogStorageError),
}

fn open(path: PathBuf) -> Result<BufReader<File>, LoadError> {
    File::open(&path)
        .map(BufReader::new)
        .map_err(|source| LoadError::Open { path, source })
}

fn read_catalog(dir: &Path) -> Result<Catalog, LoadError> {
    let groups = open(dir.join(GROUPS_FILE))?;
    let types = open(dir.join(TYPES_FILE))?;
    Ok(Catalog::from_yaml_readers(groups, types)?)
}

async fn run() -> Result<(), LoadError> {
    dotenv().ok();
    init_tracing_subscriber("fg-catalog");
    install_tracing_panic_hook("fg-catalog");

    let cli = Cli::parse();
    let catalog = read_catalog(&cli.sde_dir)?;
    info!(
        dir = %cli.sde_dir.display(),
        groups = catalog.group_count(),
        items = catalog.item_count(),
        "static data parsed"
    );

    if cli.dry_run {
        return Ok(());
    }

    let pool = create_pool_from_url(&cli.database_url)?;
    run_migrations(&pool).await?;
    save_catalog(&pool, &catalog).await?;
    info!("catalog snapshot stored");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "fg-catalog failed");
        eprintln!("fg-catalog failed: {err}");
        std::process::exit(1);
    }
}
