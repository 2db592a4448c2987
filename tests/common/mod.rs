#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use entity_rest::{build_app, resolve, AppState, FullConfig, MemoryStore, Registry};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PREFIX: &str = "/api/v1";
pub const HOST: &str = "test.local";

const CHINOOK: &str = include_str!("../../demos/chinook/entities.json");

pub fn registry() -> Registry {
    let config: FullConfig = serde_json::from_str(CHINOOK).expect("demo config parses");
    resolve(&config).expect("demo config resolves")
}

pub fn app() -> Router {
    build_app(AppState::new(MemoryStore::new(), registry()), PREFIX)
}

pub fn url(path: &str) -> String {
    format!("{}{}", PREFIX, path)
}

/// Sends one request and returns the status and the parsed JSON body (Null when empty or not JSON).
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, HOST);
    let request = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

pub async fn create(app: &Router, segment: &str, body: Value) -> Value {
    let (status, out) = send(app, Method::POST, &url(&format!("/{}/", segment)), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "create {} failed: {}", segment, out);
    out["response"].clone()
}

pub async fn artist(app: &Router, name: &str) -> i64 {
    create(app, "artists", json!({ "name": name })).await["id"].as_i64().unwrap()
}

pub async fn album(app: &Router, title: &str, artist_id: i64) -> i64 {
    create(app, "albums", json!({ "title": title, "artist_id": artist_id })).await["id"]
        .as_i64()
        .unwrap()
}

pub async fn media_type(app: &Router, name: &str) -> i64 {
    create(app, "media_types", json!({ "name": name })).await["id"].as_i64().unwrap()
}

pub async fn track(app: &Router, name: &str, album_id: i64, media_type_id: i64) -> i64 {
    create(
        app,
        "tracks",
        json!({
            "name": name,
            "album_id": album_id,
            "media_type_id": media_type_id,
            "milliseconds": 180000,
            "unit_price": 0.99
        }),
    )
    .await["id"]
        .as_i64()
        .unwrap()
}
