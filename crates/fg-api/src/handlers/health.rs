use std::sync::atomic::Ordering;

use axum::{Json, extract::State};
use serde_json::json;
use tokio::time::{Duration, timeout};

use crate::SharedState;
use crate::error::ApiError;

const READINESS_TIMEOUT: Duration = Duration::from_secs(1);

pub async fn livez() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Liveness plus the size of the catalog this instance serves from.
pub async fn healthz(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "catalog_items": state.catalog.item_count(),
        "catalog_groups": state.catalog.group_count(),
    }))
}

pub async fn readyz(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.readiness.load(Ordering::SeqCst) {
        return Err(ApiError::ServiceUnavailable("shutting_down".into()));
    }

    let client = timeout(READINESS_TIMEOUT, state.pool.get())
        .await
        .map_err(|_| ApiError::ServiceUnavailable("db_pool_timeout".into()))
        .and_then(|result| {
            result.map_err(|err| {
                ApiError::ServiceUnavailable(format!("failed to check out pool connection: {err}"))
            })
        })?;

    timeout(READINESS_TIMEOUT, client.simple_query("SELECT 1"))
        .await
        .map_err(|_| ApiError::ServiceUnavailable("db_ping_timeout".into()))
        .and_then(|result| {
            result.map_err(|err| ApiError::ServiceUnavailable(format!("health check failed: {err}")))
        })?;

    Ok(Json(json!({
        "status": "ok",
        "database": "ok",
        "application": env!("CARGO_PKG_NAME"),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_common::Catalog;

    use crate::test_state;

    #[tokio::test]
    async fn readyz_rejects_while_draining() {
        let state = test_state(Catalog::default()).unwrap();
        state.readiness.store(false, Ordering::SeqCst);

        match readyz(State(state)).await {
            Err(ApiError::ServiceUnavailable(code)) => assert_eq!(code, "shutting_down"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn healthz_reports_catalog_size() {
        let state = test_state(Catalog::default()).unwrap();
        let Json(body) = healthz(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["catalog_items"], 0);
    }
}
