#![allow(async_fn_in_trait)]

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

use deadpool_postgres::PoolError;
use serde_json::Value;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tokio_postgres::error::SqlState;

use crate::queue::{ClaimedKillmail, CorruptPayload, Stage, Transition};

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to map killmail row: {0}")]
    Mapping(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Serialization failures and deadlocks abort the transaction without
    /// effect and are worth retrying.
    pub fn is_write_conflict(&self) -> bool {
        match self {
            StoreError::Postgres(err) => matches!(
                err.code(),
                Some(code)
                    if *code == SqlState::T_R_SERIALIZATION_FAILURE
                        || *code == SqlState::T_R_DEADLOCK_DETECTED
            ),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Corrupt(#[from] CorruptPayload),
}

impl QueueError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, QueueError::Corrupt(_))
    }

    pub fn is_write_conflict(&self) -> bool {
        matches!(self, QueueError::Store(err) if err.is_write_conflict())
    }
}

impl From<PgError> for QueueError {
    fn from(err: PgError) -> Self {
        QueueError::Store(StoreError::Postgres(err))
    }
}

impl From<PoolError> for QueueError {
    fn from(err: PoolError) -> Self {
        QueueError::Store(StoreError::Pool(err))
    }
}

/// Killmail row as written by the poller and the importer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewKillmail {
    pub id: i64,
    pub raw_killmail: Value,
    pub raw_valuation: Option<Value>,
}

/// Which of the two rows a feed delivery actually created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedInsert {
    pub hash_inserted: bool,
    pub killmail_inserted: bool,
}

impl FeedInsert {
    pub fn is_duplicate(&self) -> bool {
        !self.hash_inserted && !self.killmail_inserted
    }
}

/// Transactional operations the ingestion side needs from the store. Every
/// method is one all-or-nothing unit.
pub trait KillmailStore {
    /// Insert the hash and killmail rows of one feed package; existing ids
    /// are left untouched.
    async fn insert_feed_delivery(
        &self,
        killmail: &NewKillmail,
        hash: &str,
    ) -> Result<FeedInsert, StoreError>;

    /// Insert a batch of killmails in one transaction. Returns the number of
    /// rows that were new. A failed transaction is reported, never retried.
    async fn insert_killmails(&self, rows: &[NewKillmail]) -> Result<u64, StoreError>;

    /// Claim one row eligible for `stage`, run `plan` on it and apply the
    /// resulting transition in the same transaction. `Ok(None)` when nothing
    /// is eligible. A planning error rolls the claim back.
    async fn claim_and_apply<F>(
        &self,
        stage: Stage,
        plan: F,
    ) -> Result<Option<Transition>, QueueError>
    where
        F: Fn(&ClaimedKillmail) -> Result<Transition, CorruptPayload>;
}
