use axum::extract::{Query, State};
use axum::http::HeaderMap;
use fg_common::db::{self, FitFilter, FitSummaryRow};
use fg_common::{Catalog, Item};
use serde::Serialize;

use super::catalog_item;
use crate::SharedState;
use crate::error::ApiError;
use crate::response::CachedJson;

/// Filters as applied, resolved against the catalog.
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct AppliedFilter {
    pub ship: Option<Item>,
    pub item: Vec<Item>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct FitSummary {
    pub killmail: i64,
    pub ship: i32,
    pub name: String,
    pub cost: Option<i64>,
    pub hi: Vec<Item>,
}

#[derive(Debug, Serialize)]
pub struct FitsResponse {
    pub filter: AppliedFilter,
    pub fits: Vec<FitSummary>,
}

fn positive_id(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok().filter(|id| *id > 0)
}

/// Build the listing filter from repeated `ship`/`item` query pairs.
/// Non-numeric and non-positive ids are ignored; the first usable `ship`
/// wins and item ids are deduplicated.
pub fn parse_filter(pairs: &[(String, String)]) -> FitFilter {
    let mut filter = FitFilter::default();
    for (key, value) in pairs {
        let Some(id) = positive_id(value) else {
            continue;
        };
        match key.as_str() {
            "ship" if filter.ship_id.is_none() => filter.ship_id = Some(id),
            "item" if !filter.item_ids.contains(&id) => filter.item_ids.push(id),
            _ => {}
        }
    }
    filter
}

pub fn applied_filter(filter: &FitFilter, catalog: &Catalog) -> AppliedFilter {
    AppliedFilter {
        ship: filter.ship_id.and_then(|id| catalog_item(catalog, id)),
        item: filter
            .item_ids
            .iter()
            .filter_map(|id| catalog_item(catalog, *id))
            .collect(),
    }
}

/// High slot modules of a stored fit; empty positions, charges and ids the
/// catalog no longer knows are left out.
pub fn summarize(row: FitSummaryRow, catalog: &Catalog) -> FitSummary {
    let hi = row
        .hi
        .iter()
        .filter(|id| **id > 0 && !catalog.is_charge(**id))
        .filter_map(|id| catalog_item(catalog, *id))
        .collect();

    FitSummary {
        killmail: row.killmail_id,
        ship: row.ship_id,
        name: catalog_item(catalog, row.ship_id)
            .map(|ship| ship.name)
            .unwrap_or_default(),
        cost: row.cost,
        hi,
    }
}

pub async fn list_fits(
    State(state): State<SharedState>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<CachedJson<FitsResponse>, ApiError> {
    let filter = parse_filter(&pairs);
    let rows = db::list_fits(&state.pool, &filter).await?;

    let response = FitsResponse {
        filter: applied_filter(&filter, &state.catalog),
        fits: rows
            .into_iter()
            .map(|row| summarize(row, &state.catalog))
            .collect(),
    };
    Ok(CachedJson::new(response, &headers))
}

#[cfg(test)]
mod tests {
    use fg_common::catalog::{StaticGroup, StaticItem};

    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_parts(
            vec![
                StaticGroup { id: 25, name: "Frigate".into(), category_code: 6 },
                StaticGroup { id: 55, name: "Projectile Weapon".into(), category_code: 7 },
                StaticGroup { id: 83, name: "Projectile Ammo".into(), category_code: 8 },
            ],
            vec![
                StaticItem::new(587, "Rifter", 25),
                StaticItem::new(2873, "200mm AutoCannon II", 55),
                StaticItem::new(185, "EMP S", 83),
            ],
        )
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn filter_ignores_unusable_ids() {
        let filter = parse_filter(&pairs(&[
            ("ship", "0"),
            ("ship", "587"),
            ("ship", "588"),
            ("item", "2873"),
            ("item", "-1"),
            ("item", "abc"),
            ("item", "2873"),
            ("item", "185"),
            ("page", "2"),
        ]));

        assert_eq!(filter.ship_id, Some(587));
        assert_eq!(filter.item_ids, vec![2873, 185]);
    }

    #[test]
    fn no_parameters_means_no_filter() {
        assert_eq!(parse_filter(&[]), FitFilter::default());
    }

    #[test]
    fn applied_filter_echoes_catalog_items() {
        let filter = FitFilter {
            ship_id: Some(587),
            item_ids: vec![2873, 999_999],
        };
        let applied = applied_filter(&filter, &catalog());

        assert_eq!(applied.ship.map(|ship| ship.name), Some("Rifter".to_string()));
        assert_eq!(applied.item.len(), 1);
        assert_eq!(applied.item[0].id, 2873);
    }

    #[test]
    fn summary_keeps_only_high_slot_modules() {
        let row = FitSummaryRow {
            killmail_id: 100,
            ship_id: 587,
            cost: Some(500_000),
            hi: vec![2873, 0, 185, 2873, 0, 0, 0, 0],
        };
        let summary = summarize(row, &catalog());

        assert_eq!(summary.name, "Rifter");
        assert_eq!(summary.cost, Some(500_000));
        assert_eq!(
            summary.hi.iter().map(|item| item.id).collect::<Vec<_>>(),
            vec![2873, 2873]
        );
    }

    #[test]
    fn unknown_hull_has_empty_name() {
        let row = FitSummaryRow {
            killmail_id: 7,
            ship_id: 11_111,
            cost: None,
            hi: vec![2873],
        };
        assert_eq!(summarize(row, &catalog()).name, "");
    }
}
