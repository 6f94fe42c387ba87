use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use fg_common::Shutdown;
use fg_common::db::{
    CatalogStorageError, DbPoolError, MigrationError, PgStore, create_pool_from_url, load_catalog,
    run_migrations,
};
use fg_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use fg_common::queue::Stage;
use fg_common::retry::RetryPolicy;
use fg_common::store::QueueError;
use fg_sync::feed::{DEFAULT_FEED_URL, DEFAULT_QUEUE_ID};
use fg_sync::worker::DEFAULT_IDLE_INTERVAL_MS;
use fg_sync::{FeedError, RedisQClient, run_poller, run_worker, supervise};
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "fg-sync",
    about = "Poll the killmail feed and turn stored killmails into fits"
)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Long-poll endpoint of the killmail feed
    #[arg(long, env = "FG_FEED_URL", default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// Queue id identifying this consumer to the feed
    #[arg(long, env = "FG_FEED_QUEUE_ID", default_value = DEFAULT_QUEUE_ID)]
    queue_id: String,

    /// Timeout for a single feed request in seconds
    #[arg(long, env = "FG_FEED_TIMEOUT_SECS", default_value_t = 30)]
    feed_timeout_secs: u64,

    /// Sleep between claims when a worker finds nothing to do
    #[arg(long, env = "FG_IDLE_POLL_INTERVAL_MS", default_value_t = DEFAULT_IDLE_INTERVAL_MS)]
    idle_poll_interval_ms: u64,

    /// Delay before restarting a loop that finished or failed
    #[arg(long, env = "FG_RESTART_INTERVAL_MS", default_value_t = 10_000)]
    restart_interval_ms: u64,

    /// Skip the feed poller and only run the workers
    #[arg(long, default_value_t = false)]
    no_poller: bool,
}

#[derive(Debug, thiserror::Error)]
enum SyncError {
    #[error("database pool error: {0}")]
    DbPool(#[from] DbPoolError),
    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),
    #[error("catalog unavailable: {0}")]
    Catalog(#[from] CatalogStorageError),
    #[error("feed client error: {0}")]
    Feed(#[from] FeedError),
    #[error("worker stopped: {0}")]
    Queue(#[from] QueueError),
}

async fn run() -> Result<(), SyncError> {
    dotenv().ok();
    init_tracing_subscriber("fg-sync");
    install_tracing_panic_hook("fg-sync");

    let cli = Cli::parse();
    let pool = create_pool_from_url(&cli.database_url)?;
    run_migrations(&pool).await?;
    let catalog = Arc::new(load_catalog(&pool).await?);

    let store = PgStore::new(pool);
    let feed = RedisQClient::new(
        &cli.feed_url,
        &cli.queue_id,
        Duration::from_secs(cli.feed_timeout_secs),
    )?;

    let idle = Duration::from_millis(cli.idle_poll_interval_ms);
    let restart = Duration::from_millis(cli.restart_interval_ms);
    let backoff = RetryPolicy::restarts(restart);
    let shutdown = Shutdown::new();

    info!(
        feed_url = %cli.feed_url,
        queue_id = %cli.queue_id,
        idle_ms = cli.idle_poll_interval_ms,
        restart_ms = cli.restart_interval_ms,
        poller = !cli.no_poller,
        "fg-sync starting"
    );

    let poller = async {
        if cli.no_poller {
            return Ok(());
        }
        supervise("poller", restart, &backoff, &shutdown, || {
            run_poller(&feed, &store, &shutdown)
        })
        .await
    };
    let extraction = supervise("extraction", restart, &backoff, &shutdown, || {
        run_worker(Stage::Extraction, &store, &catalog, idle, &shutdown)
    });
    let valuation = supervise("valuation", restart, &backoff, &shutdown, || {
        run_worker(Stage::Valuation, &store, &catalog, idle, &shutdown)
    });

    let (_, poller, extraction, valuation) = tokio::join!(
        shutdown.listen_for_signals(),
        poller,
        extraction,
        valuation
    );
    poller?;
    extraction?;
    valuation?;

    info!("fg-sync stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %err, "fg-sync failed");
        eprintln!("fg-sync failed: {err}");
        std::process::exit(1);
    }
}
