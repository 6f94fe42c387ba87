use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use crate::fit::FitRecord;
use crate::queue::{ClaimedKillmail, CorruptPayload, HashState, ProcessingState, Stage, Transition};
use crate::store::{FeedInsert, KillmailStore, NewKillmail, QueueError, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredKillmail {
    pub id: i64,
    pub raw_killmail: Value,
    pub raw_valuation: Option<Value>,
    pub state: ProcessingState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHash {
    pub id: i64,
    pub hash: String,
    pub state: i16,
}

#[derive(Debug, Default)]
struct Tables {
    killmails: BTreeMap<i64, StoredKillmail>,
    hashes: BTreeMap<i64, StoredHash>,
    fits: BTreeMap<i64, FitRecord>,
    state_log: Vec<(i64, ProcessingState)>,
}

/// In-process store with the same all-or-nothing semantics as the Postgres
/// store: every trait call holds the table lock for its whole duration and
/// only writes once the unit succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".into()))
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    /// Make every subsequent write fail, to exercise error paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn killmail(&self, id: i64) -> Option<StoredKillmail> {
        self.lock().ok()?.killmails.get(&id).cloned()
    }

    pub fn hash(&self, id: i64) -> Option<StoredHash> {
        self.lock().ok()?.hashes.get(&id).cloned()
    }

    pub fn fit(&self, killmail_id: i64) -> Option<FitRecord> {
        self.lock().ok()?.fits.get(&killmail_id).cloned()
    }

    pub fn killmail_count(&self) -> usize {
        self.lock().map(|t| t.killmails.len()).unwrap_or(0)
    }

    pub fn hash_count(&self) -> usize {
        self.lock().map(|t| t.hashes.len()).unwrap_or(0)
    }

    pub fn fit_count(&self) -> usize {
        self.lock().map(|t| t.fits.len()).unwrap_or(0)
    }

    /// Every state a killmail was written with, in write order.
    pub fn state_history(&self, id: i64) -> Vec<ProcessingState> {
        self.lock()
            .map(|t| {
                t.state_log
                    .iter()
                    .filter(|(logged, _)| *logged == id)
                    .map(|(_, state)| *state)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Seed a row directly, bypassing the ingestion paths.
    pub fn put_killmail(&self, row: StoredKillmail) {
        if let Ok(mut tables) = self.lock() {
            tables.state_log.push((row.id, row.state));
            tables.killmails.insert(row.id, row);
        }
    }

    fn insert_new(tables: &mut Tables, row: &NewKillmail) -> bool {
        if tables.killmails.contains_key(&row.id) {
            return false;
        }
        tables.killmails.insert(
            row.id,
            StoredKillmail {
                id: row.id,
                raw_killmail: row.raw_killmail.clone(),
                raw_valuation: row.raw_valuation.clone(),
                state: ProcessingState::Unprocessed,
            },
        );
        tables.state_log.push((row.id, ProcessingState::Unprocessed));
        true
    }
}

impl KillmailStore for MemoryStore {
    async fn insert_feed_delivery(
        &self,
        killmail: &NewKillmail,
        hash: &str,
    ) -> Result<FeedInsert, StoreError> {
        self.check_writable()?;
        let mut tables = self.lock()?;

        let hash_inserted = !tables.hashes.contains_key(&killmail.id);
        if hash_inserted {
            tables.hashes.insert(
                killmail.id,
                StoredHash {
                    id: killmail.id,
                    hash: hash.to_string(),
                    state: HashState::Fetched.as_i16(),
                },
            );
        }
        let killmail_inserted = Self::insert_new(&mut tables, killmail);

        Ok(FeedInsert {
            hash_inserted,
            killmail_inserted,
        })
    }

    async fn insert_killmails(&self, rows: &[NewKillmail]) -> Result<u64, StoreError> {
        self.check_writable()?;
        let mut tables = self.lock()?;

        let mut inserted = 0;
        for row in rows {
            if Self::insert_new(&mut tables, row) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn claim_and_apply<F>(
        &self,
        stage: Stage,
        plan: F,
    ) -> Result<Option<Transition>, QueueError>
    where
        F: Fn(&ClaimedKillmail) -> Result<Transition, CorruptPayload>,
    {
        let mut guard = self.lock()?;
        let tables = &mut *guard;

        let Some(row) = tables
            .killmails
            .values()
            .find(|row| row.state == stage.claims())
        else {
            return Ok(None);
        };

        let claimed = ClaimedKillmail {
            id: row.id,
            raw_killmail: row.raw_killmail.clone(),
            raw_valuation: row.raw_valuation.clone(),
            state: row.state,
        };
        let transition = plan(&claimed)?;
        self.check_writable()?;

        if let Some(fit) = &transition.fit {
            tables.fits.entry(fit.killmail_id).or_insert_with(|| fit.clone());
        }
        if let Some(cost) = transition.cost {
            if let Some(fit) = tables.fits.get_mut(&transition.killmail_id) {
                fit.cost.get_or_insert(cost);
            }
        }
        if let Some(row) = tables.killmails.get_mut(&transition.killmail_id) {
            if row.state < transition.next {
                row.state = transition.next;
                tables.state_log.push((transition.killmail_id, transition.next));
            }
        }

        Ok(Some(transition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::*;
    use crate::queue::plan_transition;
    use serde_json::json;

    fn delivery(id: i64, fitted_value: f64) -> NewKillmail {
        NewKillmail {
            id,
            raw_killmail: json!({
                "killmail_id": id,
                "solar_system_id": 30000142,
                "victim": {"ship_type_id": RIFTER, "items": [{"flag": 27, "item_type_id": AUTOCANNON}]}
            }),
            raw_valuation: Some(json!({"hash": "abc", "fittedValue": fitted_value})),
        }
    }

    #[tokio::test]
    async fn duplicate_delivery_keeps_one_row_each() {
        let store = MemoryStore::new();
        let first = store.insert_feed_delivery(&delivery(7, 0.0), "abc").await.unwrap();
        let second = store.insert_feed_delivery(&delivery(7, 0.0), "abc").await.unwrap();

        assert!(first.hash_inserted && first.killmail_inserted);
        assert!(second.is_duplicate());
        assert_eq!(store.killmail_count(), 1);
        assert_eq!(store.hash_count(), 1);
        assert_eq!(store.hash(7).unwrap().state, HashState::Fetched.as_i16());
    }

    #[tokio::test]
    async fn failed_plan_leaves_row_claimable() {
        let store = MemoryStore::new();
        store.put_killmail(StoredKillmail {
            id: 9,
            raw_killmail: json!({"victim": 3}),
            raw_valuation: None,
            state: ProcessingState::Unprocessed,
        });

        let catalog = sample_catalog();
        let err = store
            .claim_and_apply(Stage::Extraction, |row| plan_transition(Stage::Extraction, row, &catalog))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(store.killmail(9).unwrap().state, ProcessingState::Unprocessed);
        assert_eq!(store.fit_count(), 0);
    }

    #[tokio::test]
    async fn write_failure_applies_nothing() {
        let store = MemoryStore::new();
        store.insert_feed_delivery(&delivery(3, 10.0), "h").await.unwrap();
        store.set_fail_writes(true);

        let catalog = sample_catalog();
        let err = store
            .claim_and_apply(Stage::Extraction, |row| plan_transition(Stage::Extraction, row, &catalog))
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(store.fit_count(), 0);
        assert_eq!(store.killmail(3).unwrap().state, ProcessingState::Unprocessed);
    }

    #[tokio::test]
    async fn cost_is_only_filled_once() {
        let store = MemoryStore::new();
        store.put_killmail(StoredKillmail {
            id: 5,
            raw_killmail: delivery(5, 0.0).raw_killmail,
            raw_valuation: Some(json!({"fittedValue": 10.0})),
            state: ProcessingState::Extracted,
        });
        let catalog = sample_catalog();
        let fit = crate::fit::extract_fit(
            &serde_json::from_value(delivery(5, 0.0).raw_killmail).unwrap(),
            &catalog,
            Some(99),
        )
        .unwrap();
        store.lock().unwrap().fits.insert(5, fit);

        store
            .claim_and_apply(Stage::Valuation, |row| plan_transition(Stage::Valuation, row, &catalog))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.fit(5).unwrap().cost, Some(99));
        assert_eq!(store.killmail(5).unwrap().state, ProcessingState::Valued);
    }
}
