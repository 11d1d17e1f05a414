#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use helpdesk_core::{Capabilities, PipelineConfig, Store};
use http_body_util::BodyExt;
use server::AppState;
use tower::ServiceExt;

pub const TOKEN: &str = "secret";

pub fn state(store: Store, caps: Capabilities) -> AppState {
    AppState::new(store, caps, PipelineConfig::default(), Some(TOKEN.to_string())).unwrap()
}

pub async fn call(app: Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn admin_get(uri: &str) -> Request<Body> {
    Request::get(uri).header("X-ADMIN-TOKEN", TOKEN).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &serde_json::Value, admin: bool) -> Request<Body> {
    let mut req = Request::post(uri).header("content-type", "application/json");
    if admin {
        req = req.header("X-ADMIN-TOKEN", TOKEN);
    }
    req.body(Body::from(body.to_string())).unwrap()
}
