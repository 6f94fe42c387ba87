use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use fg_common::db::{DbPoolError, MigrationError, PgStore, create_pool_from_url, run_migrations};
use fg_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use fg_import::lookup::DEFAULT_ESI_BASE_URL;
use fg_import::{DEFAULT_IMPORT_LIMIT, EsiClient, HashIndex, ImportError, LookupError, run_import};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "fg-import",
    about = "Backfill historical killmails from an id to hash mapping"
)]
struct Cli {
    /// JSON file mapping killmail id to hash
    file: PathBuf,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Base url of the killmail detail API
    #[arg(long, env = "FG_ESI_BASE_URL", default_value = DEFAULT_ESI_BASE_URL)]
    esi_base_url: String,

    /// Stop after this many killmails were resolved
    #[arg(long, env = "FG_IMPORT_LIMIT", default_value_t = DEFAULT_IMPORT_LIMIT)]
    limit: usize,

    /// Timeout for a single detail lookup in seconds
    #[arg(long, env = "FG_ESI_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("database pool error: {0}")]
    DbPool(#[from] DbPoolError),
    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),
    #[error("lookup client error: {0}")]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Import(#[from] ImportError),
}

async fn run() -> Result<(), RunError> {
    dotenv().ok();
    init_tracing_subscriber("fg-import");
    install_tracing_panic_hook("fg-import");

    let cli = Cli::parse();
    let index = HashIndex::read(&cli.file)?;
    info!(
        file = %cli.file.display(),
        entries = index.entries.len(),
        skipped = index.skipped.len(),
        limit = cli.limit,
        "hash index loaded"
    );

    let pool = create_pool_from_url(&cli.database_url)?;
    run_migrations(&pool).await?;
    let store = PgStore::new(pool);
    let lookup = EsiClient::new(&cli.esi_base_url, Duration::from_secs(cli.timeout_secs))?;

    let summary = run_import(&index, &lookup, &store, cli.limit).await?;
    info!(inserted = summary.inserted, resolved = summary.resolved, "fg-import done");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "fg-import failed");
        eprintln!("fg-import failed: {err}");
        std::process::exit(1);
    }
}
