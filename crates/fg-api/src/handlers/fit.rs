use axum::extract::{Query, State};
use axum::http::HeaderMap;
use fg_common::db::{KillmailRow, fetch_killmail};
use fg_common::{Catalog, FitLayout, Item, Killmail, Valuation, extract_layout};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::catalog_item;
use crate::SharedState;
use crate::error::ApiError;
use crate::response::CachedJson;

#[derive(Debug, Default, Deserialize)]
pub struct FitParams {
    pub id: Option<String>,
}

/// One killmail with its slot layout rebuilt from the stored payload.
#[derive(Debug, Serialize)]
pub struct FitView {
    pub killmail: i64,
    pub valuation: Option<Valuation>,
    pub ship: Option<Item>,
    #[serde(flatten)]
    pub layout: FitLayout,
}

pub fn parse_id(raw: Option<&str>) -> Result<i64, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing fit id".into()))?;

    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::BadRequest(format!("invalid fit id: {raw}"))),
    }
}

pub fn fit_view(row: KillmailRow, catalog: &Catalog) -> Result<FitView, ApiError> {
    let killmail: Killmail = serde_json::from_value(row.raw_killmail).map_err(|err| {
        ApiError::Internal(format!("stored killmail {} does not decode: {err}", row.id))
    })?;

    // A broken valuation only costs the client the price block.
    let valuation = row.raw_valuation.and_then(|raw| {
        serde_json::from_value::<Valuation>(raw)
            .map_err(|err| warn!(killmail_id = row.id, error = %err, "stored valuation does not decode"))
            .ok()
    });

    Ok(FitView {
        killmail: row.id,
        valuation,
        ship: catalog_item(catalog, killmail.victim.ship_type_id),
        layout: extract_layout(&killmail.item_pairs(), catalog),
    })
}

pub async fn get_fit(
    State(state): State<SharedState>,
    Query(params): Query<FitParams>,
    headers: HeaderMap,
) -> Result<CachedJson<FitView>, ApiError> {
    let id = parse_id(params.id.as_deref())?;
    let row = fetch_killmail(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("killmail {id} not found")))?;

    Ok(CachedJson::new(fit_view(row, &state.catalog)?, &headers))
}
