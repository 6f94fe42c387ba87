pub mod importer;
pub mod lookup;

pub use importer::{DEFAULT_IMPORT_LIMIT, HashIndex, ImportError, ImportSummary, run_import};
pub use lookup::{DetailLookup, EsiClient, LookupError};
