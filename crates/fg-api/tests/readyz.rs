use std::sync::atomic::Ordering;

use axum::http::StatusCode;
use tower::ServiceExt;

mod common;

use common::{body_json, catalog, get};

#[tokio::test]
async fn readyz_is_unavailable_while_draining() {
    let state = fg_api::test_state(catalog()).unwrap();
    state.readiness.store(false, Ordering::SeqCst);
    let app = fg_api::create_router(state);

    let response = app.oneshot(get("/readyz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["code"], "service_unavailable");
    assert_eq!(body["message"], "service unavailable");
    assert!(body["request_id"].is_string());
}
