pub mod catalog;
pub mod fits;
pub mod killmails;
pub mod migrations;
pub mod pool;
pub mod util;

pub use catalog::{CatalogStorageError, load_catalog, save_catalog};
pub use fits::{FIT_LIST_LIMIT, FitFilter, FitSummaryRow, list_fits};
pub use killmails::{KillmailRow, PgStore, fetch_killmail};
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPoolError, PgPool, create_pool_from_url};
