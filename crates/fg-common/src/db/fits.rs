use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use tracing::instrument;

use crate::db::PgPool;
use crate::db::util::TimedClientExt;
use crate::store::StoreError;

/// Listing never returns more than this many fits.
pub const FIT_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FitFilter {
    pub ship_id: Option<i32>,
    /// Every listed type id must be fitted (modules or charges).
    pub item_ids: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitSummaryRow {
    pub killmail_id: i64,
    pub ship_id: i32,
    pub cost: Option<i64>,
    pub hi: Vec<i32>,
}

fn row_to_summary(row: &Row) -> Result<FitSummaryRow, StoreError> {
    Ok(FitSummaryRow {
        killmail_id: row.try_get("killmail_id")?,
        ship_id: row.try_get("ship_id")?,
        cost: row.try_get("cost")?,
        hi: row.try_get("hi")?,
    })
}

/// SQL and positional parameters for a listing query.
fn build_list_query(filter: &FitFilter) -> (String, Vec<Box<dyn ToSql + Sync + Send>>) {
    let mut values: Vec<Box<dyn ToSql + Sync + Send>> = Vec::new();
    let mut query = String::from("SELECT killmail_id, ship_id, cost, hi FROM fit WHERE true");

    if let Some(ship_id) = filter.ship_id {
        values.push(Box::new(ship_id));
        query.push_str(&format!(" AND ship_id = ${}", values.len()));
    }

    if !filter.item_ids.is_empty() {
        values.push(Box::new(filter.item_ids.clone()));
        query.push_str(&format!(" AND all_items @> ${}::int4[]", values.len()));
    }

    values.push(Box::new(FIT_LIST_LIMIT));
    query.push_str(&format!(" ORDER BY killmail_id DESC LIMIT ${}", values.len()));

    (query, values)
}

/// Newest fits first, optionally restricted by ship hull and contained items.
#[instrument(skip(pool))]
pub async fn list_fits(pool: &PgPool, filter: &FitFilter) -> Result<Vec<FitSummaryRow>, StoreError> {
    let client = pool.get().await?;
    let (query, values) = build_list_query(filter);
    let params: Vec<&(dyn ToSql + Sync)> = values
        .iter()
        .map(|value| value.as_ref() as &(dyn ToSql + Sync))
        .collect();

    let rows = client.timed_query(&query, &params, "list_fits").await?;
    rows.iter().map(row_to_summary).collect()
}
