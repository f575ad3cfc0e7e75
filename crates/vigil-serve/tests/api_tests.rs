//! Router-level tests exercising the HTTP surface against an in-memory
//! store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use vigil_core::{Keys, MemoryStore, Store};
use vigil_serve::{AppState, Config, router};

fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        prefix: "t".to_string(),
        store_timeout: std::time::Duration::from_secs(5),
    }
}

/// Index one event by hand, the way the pipeline's writer lays it out.
async fn seed_event(store: &dyn Store, keys: &Keys, id: &str, ts: f64, server: &str, mode: &str) {
    let raw = format!(
        r#"{{"id":"{id}","date":{ts},"server_name":"{server}","security_mode":"{mode}","ip":"203.0.113.1"}}"#
    );
    store.set_nx_ex(&keys.raw(id), &raw, std::time::Duration::from_secs(3600))
        .await
        .unwrap();
    store.zadd(&keys.time_index(), id, ts).await.unwrap();
    store
        .sadd(
            &keys.attr(vigil_core::FilterField::ServerName, server),
            id,
        )
        .await
        .unwrap();
    store
        .sadd(&keys.attr(vigil_core::FilterField::SecurityMode, mode), id)
        .await
        .unwrap();
}

async fn seeded_app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let keys = Keys::new("t");
    seed_event(store.as_ref(), &keys, "id1", 100.0, "a.example", "block").await;
    seed_event(store.as_ref(), &keys, "id2", 200.0, "a.example", "allow").await;
    seed_event(store.as_ref(), &keys, "id3", 300.0, "b.example", "block").await;
    router(AppState::new(store, test_config()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(seeded_app().await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_search_returns_events_newest_first() {
    let (status, body) = get(
        seeded_app().await,
        "/api/v1/reports/search?start=0&end=1000",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["dropped"], 0);
    let ids: Vec<&str> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["id3", "id2", "id1"]);
    // Hydration adds a readable timestamp
    assert!(body["events"][0]["_time"].is_string());
}

#[tokio::test]
async fn test_search_with_filters() {
    let (status, body) = get(
        seeded_app().await,
        "/api/v1/reports/search?start=0&end=1000&server_name=a.example&security_mode=block",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["events"][0]["id"], "id1");
}

#[tokio::test]
async fn test_search_pagination() {
    let (status, body) = get(
        seeded_app().await,
        "/api/v1/reports/search?start=0&end=1000&limit=1&offset=1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
    assert_eq!(body["events"][0]["id"], "id2");
}

#[tokio::test]
async fn test_unknown_query_key_is_400() {
    let (status, body) = get(
        seeded_app().await,
        "/api/v1/reports/search?start=0&end=1000&user_agent=curl",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains("user_agent"));
}

#[tokio::test]
async fn test_missing_range_is_400() {
    let (status, _) = get(seeded_app().await, "/api/v1/reports/search?end=1000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inverted_range_is_400() {
    let (status, _) = get(
        seeded_app().await,
        "/api/v1/reports/search?start=1000&end=0",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_limit_out_of_bounds_is_400() {
    let (status, _) = get(
        seeded_app().await,
        "/api/v1/reports/search?start=0&end=1000&limit=5000",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_iso_bounds() {
    let store = Arc::new(MemoryStore::new());
    let keys = Keys::new("t");
    // 2023-11-14T12:00:00Z
    seed_event(store.as_ref(), &keys, "id1", 1_699_963_200.0, "a", "block").await;
    let app = router(AppState::new(store, test_config()));

    let (status, body) = get(
        app,
        "/api/v1/reports/search?start=2023-11-14&end=2023-11-15T00:00:00",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
}
