pub mod catalog;
pub mod db;
pub mod fit;
pub mod killmail;
pub mod logging;
pub mod queue;
pub mod retry;
pub mod shutdown;
pub mod slot;
pub mod store;

pub use catalog::{Catalog, CatalogError, SearchHit, SearchKind};
pub use fit::{FitLayout, FitRecord, Item, SlotCell, extract_fit, extract_layout};
pub use killmail::{FeedEnvelope, FeedPackage, Killmail, Valuation};
pub use shutdown::Shutdown;
