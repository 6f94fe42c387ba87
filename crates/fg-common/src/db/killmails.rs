use serde_json::Value;
use tokio_postgres::Row;
use tokio_postgres::types::Json;
use tracing::{debug, instrument};

use crate::db::PgPool;
use crate::db::util::TimedClientExt;
use crate::queue::{ClaimedKillmail, CorruptPayload, HashState, ProcessingState, Stage, Transition};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::store::{FeedInsert, KillmailStore, NewKillmail, QueueError, StoreError};

const INSERT_KILLMAIL: &str = "INSERT INTO killmail (id, raw_killmail, raw_valuation, state)
VALUES ($1, $2, $3, $4)
ON CONFLICT (id) DO NOTHING";

const INSERT_HASH: &str = "INSERT INTO hash (id, hash, state)
VALUES ($1, $2, $3)
ON CONFLICT (id) DO NOTHING";

const CLAIM_KILLMAIL: &str = "SELECT id, raw_killmail, raw_valuation, state
FROM killmail
WHERE state = $1
LIMIT 1
FOR UPDATE SKIP LOCKED";

const INSERT_FIT: &str = "INSERT INTO fit (
    killmail_id, ship_id, cost, solar_system_id, hi, med, low, rig, sub, all_items
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (killmail_id) DO NOTHING";

const FILL_COST: &str = "UPDATE fit SET cost = $2 WHERE killmail_id = $1 AND cost IS NULL";

const ADVANCE_STATE: &str = "UPDATE killmail SET state = $2 WHERE id = $1 AND state < $2";

/// Stored killmail as read back by the API.
#[derive(Debug, Clone, PartialEq)]
pub struct KillmailRow {
    pub id: i64,
    pub raw_killmail: Value,
    pub raw_valuation: Option<Value>,
    pub state: ProcessingState,
}

fn row_to_killmail(row: &Row) -> Result<KillmailRow, StoreError> {
    let state: i16 = row.try_get("state")?;
    Ok(KillmailRow {
        id: row.try_get("id")?,
        raw_killmail: row.try_get("raw_killmail")?,
        raw_valuation: row.try_get("raw_valuation")?,
        state: ProcessingState::from_i16(state)
            .ok_or_else(|| StoreError::Mapping(format!("unknown killmail state: {state}")))?,
    })
}

impl From<KillmailRow> for ClaimedKillmail {
    fn from(row: KillmailRow) -> Self {
        Self {
            id: row.id,
            raw_killmail: row.raw_killmail,
            raw_valuation: row.raw_valuation,
            state: row.state,
        }
    }
}

#[instrument(skip(pool))]
pub async fn fetch_killmail(pool: &PgPool, id: i64) -> Result<Option<KillmailRow>, StoreError> {
    let client = pool.get().await?;
    let row = client
        .timed_query_opt(
            "SELECT id, raw_killmail, raw_valuation, state FROM killmail WHERE id = $1",
            &[&id],
            "fetch_killmail",
        )
        .await?;
    row.as_ref().map(row_to_killmail).transpose()
}

/// Postgres-backed [`KillmailStore`]. Every operation is one transaction.
/// Feed inserts and claims retry serialization failures and deadlocks with
/// backoff; the bulk insert never retries.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    conflicts: RetryPolicy,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            conflicts: RetryPolicy::default(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn try_insert_feed_delivery(
        &self,
        killmail: &NewKillmail,
        hash: &str,
    ) -> Result<FeedInsert, StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let hash_inserted = tx
            .timed_execute(
                INSERT_HASH,
                &[&killmail.id, &hash, &HashState::Fetched.as_i16()],
                "insert_hash",
            )
            .await?
            > 0;
        let killmail_inserted = tx
            .timed_execute(
                INSERT_KILLMAIL,
                &[
                    &killmail.id,
                    &Json(&killmail.raw_killmail),
                    &killmail.raw_valuation.as_ref().map(Json),
                    &ProcessingState::Unprocessed.as_i16(),
                ],
                "insert_killmail",
            )
            .await?
            > 0;

        tx.commit().await?;
        Ok(FeedInsert {
            hash_inserted,
            killmail_inserted,
        })
    }

    async fn try_claim_and_apply<F>(
        &self,
        stage: Stage,
        plan: &F,
    ) -> Result<Option<Transition>, QueueError>
    where
        F: Fn(&ClaimedKillmail) -> Result<Transition, CorruptPayload>,
    {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let Some(row) = tx
            .timed_query_opt(CLAIM_KILLMAIL, &[&stage.claims().as_i16()], "claim_killmail")
            .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };
        let claimed = ClaimedKillmail::from(row_to_killmail(&row)?);

        let transition = match plan(&claimed) {
            Ok(transition) => transition,
            Err(corrupt) => {
                tx.rollback().await?;
                return Err(corrupt.into());
            }
        };

        if let Some(fit) = &transition.fit {
            tx.timed_execute(
                INSERT_FIT,
                &[
                    &fit.killmail_id,
                    &fit.ship_id,
                    &fit.cost,
                    &fit.solar_system_id,
                    &fit.hi,
                    &fit.med,
                    &fit.low,
                    &fit.rig,
                    &fit.sub,
                    &fit.all_items,
                ],
                "insert_fit",
            )
            .await?;
        }
        if let Some(cost) = transition.cost {
            tx.timed_execute(FILL_COST, &[&transition.killmail_id, &cost], "fill_fit_cost")
                .await?;
        }
        tx.timed_execute(
            ADVANCE_STATE,
            &[&transition.killmail_id, &transition.next.as_i16()],
            "advance_killmail_state",
        )
        .await?;

        tx.commit().await?;
        debug!(
            killmail_id = transition.killmail_id,
            stage = stage.as_str(),
            next = transition.next.as_str(),
            "transition committed"
        );
        Ok(Some(transition))
    }
}

impl KillmailStore for PgStore {
    #[instrument(skip(self, killmail, hash), fields(killmail_id = killmail.id))]
    async fn insert_feed_delivery(
        &self,
        killmail: &NewKillmail,
        hash: &str,
    ) -> Result<FeedInsert, StoreError> {
        retry_with_backoff(
            &self.conflicts,
            "insert_feed_delivery",
            StoreError::is_write_conflict,
            || self.try_insert_feed_delivery(killmail, hash),
        )
        .await
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn insert_killmails(&self, rows: &[NewKillmail]) -> Result<u64, StoreError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let mut inserted = 0;
        for row in rows {
            inserted += tx
                .timed_execute(
                    INSERT_KILLMAIL,
                    &[
                        &row.id,
                        &Json(&row.raw_killmail),
                        &row.raw_valuation.as_ref().map(Json),
                        &ProcessingState::Unprocessed.as_i16(),
                    ],
                    "insert_killmail",
                )
                .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    #[instrument(skip(self, plan), fields(stage = stage.as_str()))]
    async fn claim_and_apply<F>(
        &self,
        stage: Stage,
        plan: F,
    ) -> Result<Option<Transition>, QueueError>
    where
        F: Fn(&ClaimedKillmail) -> Result<Transition, CorruptPayload>,
    {
        retry_with_backoff(
            &self.conflicts,
            "claim_and_apply",
            QueueError::is_write_conflict,
            || self.try_claim_and_apply(stage, &plan),
        )
        .await
    }
}
