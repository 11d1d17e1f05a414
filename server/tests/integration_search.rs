mod common;

use axum::http::StatusCode;
use common::{admin_get, call, get, post_json, state};
use helpdesk_core::testing::article;
use helpdesk_core::{Capabilities, Store};
use serde_json::{json, Value};

#[tokio::test]
async fn search_returns_ranked_results() {
    let store = Store::temporary().unwrap();
    store
        .save_articles(&[
            article("a1", "Shipping", "Orders ship within 3 days domestically."),
            article("a2", "Refunds", "Refunds are issued within 5 days."),
        ])
        .unwrap();
    let state = state(store, Capabilities::offline());
    state.index.rebuild(&state.store, &state.caps, &state.config).await.unwrap();
    let app = server::router(state);

    let (status, body) = call(app.clone(), get("/search?q=when%20will%20my%20order%20arrive")).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["articleId"], "a1");
    assert!(arr[0]["snippet"].as_str().unwrap().contains("ship"));

    let (_, body) = call(app, get("/search?q=zebra")).await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn admin_routes_require_token() {
    let store = Store::temporary().unwrap();
    let app = server::router(state(store, Capabilities::offline()));

    let req = axum::http::Request::post("/index/rebuild").body(axum::body::Body::empty()).unwrap();
    let (status, _) = call(app.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = axum::http::Request::post("/index/rebuild")
        .header("X-ADMIN-TOKEN", "wrong")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _) = call(app.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(app, admin_get("/preset/export")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn preset_import_rebuilds_the_index() {
    let store = Store::temporary().unwrap();
    let app = server::router(state(store, Capabilities::offline()));

    let preset = json!({
        "version": 1,
        "agentProfile": {"name": "Acme"},
        "faqList": [{"question": "환불 어떻게 하나요", "answer": "영수증을 지참해 매장에 방문해주세요.", "tags": ["환불", "refund"]}],
        "docArticles": [{"id": "a1", "title": "Shipping", "body": "Orders ship within 3 days domestically."}],
        "persona": {"companyId": "acme", "displayName": "Acme", "agentLang": "en", "role": "CX"}
    });
    let (status, body) = call(app.clone(), post_json("/preset/import", &preset, true)).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["numDocs"], 1);

    let (_, body) = call(app.clone(), get("/search?q=orders")).await;
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["results"][0]["articleId"], "a1");

    let (status, body) = call(app.clone(), admin_get("/preset/export")).await;
    assert_eq!(status, StatusCode::OK);
    let exported: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(exported["agentProfile"]["name"], "Acme");
    assert_eq!(exported["faqList"][0]["answer"], "영수증을 지참해 매장에 방문해주세요.");
    assert_eq!(exported["persona"]["companyId"], "acme");

    let req = axum::http::Request::post("/preset/import")
        .header("X-ADMIN-TOKEN", common::TOKEN)
        .body(axum::body::Body::from("[1, 2, 3]"))
        .unwrap();
    let (status, _) = call(app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
