use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use fg_common::store::{KillmailStore, NewKillmail, StoreError};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::lookup::DetailLookup;

pub const DEFAULT_IMPORT_LIMIT: usize = 50;
pub const PROGRESS_EVERY: usize = 5;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("hash index is not a JSON object of id to hash: {0}")]
    Index(#[from] serde_json::Error),
    #[error("failed to persist imported killmails: {0}")]
    Store(#[from] StoreError),
}

/// Killmail id to hash mapping in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashIndex {
    pub entries: BTreeMap<i64, String>,
    pub skipped: Vec<String>,
}

impl HashIndex {
    pub fn parse(raw: &str) -> Result<Self, ImportError> {
        let parsed: HashMap<String, String> = serde_json::from_str(raw)?;
        let mut index = HashIndex::default();
        for (key, hash) in parsed {
            match key.trim().parse::<i64>() {
                Ok(id) => {
                    index.entries.insert(id, hash);
                }
                Err(_) => index.skipped.push(key),
            }
        }
        index.skipped.sort();
        Ok(index)
    }

    pub fn read(path: &Path) -> Result<Self, ImportError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ImportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub resolved: usize,
    pub failed: usize,
    pub inserted: u64,
}

/// Resolve entries in ascending id order until `limit` succeeded, then
/// persist all of them in one transaction. Lookup failures are skipped; a
/// failed bulk insert fails the whole run.
#[instrument(skip_all, fields(entries = index.entries.len(), limit = limit))]
pub async fn run_import<L, S>(
    index: &HashIndex,
    lookup: &L,
    store: &S,
    limit: usize,
) -> Result<ImportSummary, ImportError>
where
    L: DetailLookup,
    S: KillmailStore,
{
    for key in &index.skipped {
        warn!(key = %key, "skipping unparseable killmail id");
    }

    let mut rows: Vec<NewKillmail> = Vec::new();
    let mut summary = ImportSummary::default();

    for (&id, hash) in &index.entries {
        if rows.len() >= limit {
            break;
        }

        let killmail = match lookup.fetch(id, hash).await {
            Ok(killmail) => killmail,
            Err(err) => {
                summary.failed += 1;
                warn!(killmail_id = id, error = %err, "lookup failed; skipping");
                continue;
            }
        };
        let raw_killmail = match serde_json::to_value(&killmail) {
            Ok(raw) => raw,
            Err(err) => {
                summary.failed += 1;
                warn!(killmail_id = id, error = %err, "cannot serialize killmail; skipping");
                continue;
            }
        };

        rows.push(NewKillmail {
            id,
            raw_killmail,
            raw_valuation: None,
        });
        if rows.len() % PROGRESS_EVERY == 0 {
            info!(resolved = rows.len(), last_id = id, "import progress");
        }
    }

    summary.resolved = rows.len();
    summary.inserted = store.insert_killmails(&rows).await?;
    info!(
        resolved = summary.resolved,
        failed = summary.failed,
        inserted = summary.inserted,
        "import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_orders_numerically_and_skips_bad_ids() {
        let index = HashIndex::parse(r#"{"10": "b", "9": "a", "oops": "c", "100": "d"}"#).unwrap();
        let ids: Vec<i64> = index.entries.keys().copied().collect();
        assert_eq!(ids, vec![9, 10, 100]);
        assert_eq!(index.skipped, vec!["oops".to_string()]);
    }

    #[test]
    fn index_must_be_an_object() {
        assert!(matches!(HashIndex::parse("[1, 2]"), Err(ImportError::Index(_))));
    }
}
