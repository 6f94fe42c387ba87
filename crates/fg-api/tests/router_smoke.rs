use std::io::Read;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use flate2::read::GzDecoder;
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{app, body_bytes, body_json, get};

#[tokio::test]
async fn livez_and_healthz_are_ok() {
    let app = app();

    let livez = app.clone().oneshot(get("/livez")).await.unwrap();
    assert_eq!(livez.status(), StatusCode::OK);
    assert!(livez.headers().contains_key("x-request-id"));

    let healthz = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(healthz.status(), StatusCode::OK);
    assert_eq!(body_json(healthz).await["catalog_items"], 3);
}

#[tokio::test]
async fn search_finds_items_by_lowercase_substring() {
    let response = app().oneshot(get("/api/search?term=Shield")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=3600");
    assert_eq!(
        body_json(response).await,
        json!({
            "search": "shield",
            "results": [{"type": "item", "name": "Large Shield Extender", "id": 3831}]
        })
    );
}

#[tokio::test]
async fn search_tags_hulls_as_ships() {
    let response = app().oneshot(get("/api/search?term=rift")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["results"][0]["type"], "ship");
    assert_eq!(body["results"][0]["id"], 587);
}

#[tokio::test]
async fn short_or_missing_terms_return_no_results() {
    let app = app();

    for uri in ["/api/search?term=sh", "/api/search"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["results"], json!([]));
    }
}

#[tokio::test]
async fn responses_are_gzipped_on_request() {
    let request = Request::builder()
        .uri("/api/search?term=shield")
        .header(header::ACCEPT_ENCODING, "gzip, deflate")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");

    let compressed = body_bytes(response).await;
    let mut decoded = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut decoded)
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&decoded).unwrap();
    assert_eq!(body["results"][0]["name"], "Large Shield Extender");
}

#[tokio::test]
async fn cors_allows_any_origin_for_get() {
    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/search?term=shield")
        .header(header::ORIGIN, "https://fittin.gs")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();

    let response = app().oneshot(preflight).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "3600");
    assert!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap()
            .contains("GET")
    );
}

#[tokio::test]
async fn fit_requires_a_usable_id() {
    let app = app();

    let missing = app.clone().oneshot(get("/api/fit")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(missing).await["message"], "missing fit id");

    let invalid = app.oneshot(get("/api/fit?id=abc")).await.unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(invalid).await["code"], "bad_request");
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let response = app().oneshot(get("/api/killmails")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
