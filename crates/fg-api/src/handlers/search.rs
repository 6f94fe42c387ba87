use axum::extract::{Query, State};
use axum::http::HeaderMap;
use fg_common::SearchHit;
use serde::{Deserialize, Serialize};

use crate::SharedState;
use crate::response::CachedJson;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub term: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub search: String,
    pub results: Vec<SearchHit>,
}

pub async fn search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
    headers: HeaderMap,
) -> CachedJson<SearchResponse> {
    let search = params.term.trim().to_lowercase();
    let results = state.catalog.search(&search);
    CachedJson::new(SearchResponse { search, results }, &headers)
}
