#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::Request;
use fg_common::Catalog;
use fg_common::catalog::{StaticGroup, StaticItem};
use http_body_util::BodyExt;

pub fn catalog() -> Catalog {
    Catalog::from_parts(
        vec![
            StaticGroup { id: 25, name: "Frigate".into(), category_code: 6 },
            StaticGroup { id: 38, name: "Shield Extender".into(), category_code: 7 },
            StaticGroup { id: 83, name: "Projectile Ammo".into(), category_code: 8 },
        ],
        vec![
            StaticItem::new(587, "Rifter", 25),
            StaticItem::new(3831, "Large Shield Extender", 38),
            StaticItem::new(185, "EMP S", 83),
        ],
    )
}

pub fn app() -> Router {
    let state = fg_api::test_state(catalog()).unwrap();
    fg_api::create_router(state)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
