mod common;

use axum::http::{Method, StatusCode};
use common::{album, app, artist, create, media_type, send, track, url, HOST};
use serde_json::json;

#[tokio::test]
async fn create_then_read_round_trip() {
    let app = app();
    let created = create(&app, "artists", json!({"name": "AC/DC"})).await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["name"], "AC/DC");

    let (status, body) = send(&app, Method::GET, &url(&format!("/artists/{}", id)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], json!({"id": id, "name": "AC/DC"}));
}

#[tokio::test]
async fn read_role_hides_unlisted_columns() {
    let app = app();
    let artist_id = artist(&app, "Audioslave").await;
    let album_id = album(&app, "Out Of Exile", artist_id).await;
    let mt = media_type(&app, "MPEG audio file").await;
    let track_id = track(&app, "Be Yourself", album_id, mt).await;

    let (status, body) = send(&app, Method::GET, &url(&format!("/tracks/{}", track_id)), None).await;
    assert_eq!(status, StatusCode::OK);
    let row = body["response"].as_object().unwrap();
    assert_eq!(row["name"], "Be Yourself");
    assert_eq!(row["unit_price"], "0.99");
    assert!(!row.contains_key("media_type_id"));
    assert!(!row.contains_key("genre_id"));
}

#[tokio::test]
async fn missing_rows_are_404_for_every_entity() {
    let app = app();
    for (segment, name) in [
        ("artists", "Artist"),
        ("albums", "Album"),
        ("genres", "Genre"),
        ("media_types", "MediaType"),
        ("tracks", "Track"),
    ] {
        let (status, body) = send(&app, Method::GET, &url(&format!("/{}/999", segment)), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", segment);
        assert_eq!(body["detail"], format!("{} not found", name));
        assert!(body.get("meta_data").is_none());
    }
}

#[tokio::test]
async fn duplicate_unique_value_is_a_conflict() {
    let app = app();
    artist(&app, "Accept").await;
    let (status, body) = send(&app, Method::POST, &url("/artists/"), Some(json!({"name": "Accept"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Artist already exists");
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn create_rejects_missing_required_field() {
    let app = app();
    let (status, body) = send(&app, Method::POST, &url("/albums/"), Some(json!({"title": "Orphan"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "artist_id is required");
}

#[tokio::test]
async fn create_rejects_rule_violations() {
    let app = app();
    let (status, _) = send(&app, Method::POST, &url("/artists/"), Some(json!({"name": ""}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, Method::POST, &url("/artists/"), Some(json!({"name": 7}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, Method::POST, &url("/artists/"), Some(json!(["not", "an", "object"]))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_foreign_key_is_rejected() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        &url("/albums/"),
        Some(json!({"title": "Nowhere", "artist_id": 404})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn non_integer_id_is_422() {
    let app = app();
    let (status, body) = send(&app, Method::GET, &url("/artists/abc"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "id must be an integer");
}

#[tokio::test]
async fn out_of_range_limit_is_422() {
    let app = app();
    let (status, _) = send(&app, Method::GET, &url("/artists/?limit=0"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, Method::GET, &url("/artists/?limit=1001"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, Method::GET, &url("/artists/?offset=-1"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn patch_changes_only_sent_fields() {
    let app = app();
    let artist_id = artist(&app, "Aerosmith").await;
    let album_id = album(&app, "Big Ones", artist_id).await;
    let mt = media_type(&app, "AAC audio file").await;
    let track_id = track(&app, "Walk On Water", album_id, mt).await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &url(&format!("/tracks/{}", track_id)),
        Some(json!({"composer": "Steven Tyler", "name": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["composer"], "Steven Tyler");
    assert_eq!(body["response"]["name"], "Walk On Water");
    assert_eq!(body["response"]["milliseconds"], 180000);
    assert_eq!(
        body["meta_data"]["location"],
        format!("http://{}{}", HOST, url(&format!("/tracks/{}", track_id)))
    );
}

#[tokio::test]
async fn empty_patch_returns_current_row() {
    let app = app();
    let id = artist(&app, "Alanis Morissette").await;
    let (status, body) = send(&app, Method::PATCH, &url(&format!("/artists/{}", id)), Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["name"], "Alanis Morissette");
}

#[tokio::test]
async fn put_replace_all_nulls_omitted_fields() {
    let app = app();
    let artist_id = artist(&app, "Alice In Chains").await;
    let album_id = album(&app, "Facelift", artist_id).await;
    let mt = media_type(&app, "Protected AAC audio file").await;
    let track_id = track(&app, "We Die Young", album_id, mt).await;

    // name is NOT NULL, so omitting it under replace_all cannot succeed
    let (status, body) = send(
        &app,
        Method::PUT,
        &url(&format!("/tracks/{}", track_id)),
        Some(json!({"media_type_id": mt, "milliseconds": 152084, "unit_price": 0.99})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "name may not be null");

    let (status, body) = send(
        &app,
        Method::PUT,
        &url(&format!("/tracks/{}", track_id)),
        Some(json!({"name": "We Die Young", "media_type_id": mt, "milliseconds": 152084, "unit_price": 0.99})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["album_id"], json!(null));
    assert_eq!(body["response"]["milliseconds"], 152084);
}

#[tokio::test]
async fn put_require_all_rejects_partial_payload() {
    let app = app();
    let artist_id = artist(&app, "Apocalyptica").await;
    let album_id = album(&app, "Plays Metallica", artist_id).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &url(&format!("/albums/{}", album_id)),
        Some(json!({"title": "Plays Metallica By Four Cellos"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "artist_id is required");

    let (status, body) = send(
        &app,
        Method::PUT,
        &url(&format!("/albums/{}", album_id)),
        Some(json!({"title": "Plays Metallica By Four Cellos", "artist_id": artist_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["title"], "Plays Metallica By Four Cellos");
    assert_eq!(
        body["meta_data"]["location"],
        format!("http://{}{}", HOST, url(&format!("/albums/{}", album_id)))
    );
}

#[tokio::test]
async fn update_of_missing_row_is_404() {
    let app = app();
    let (status, body) = send(&app, Method::PATCH, &url("/artists/41"), Some(json!({"name": "Ghost"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Artist not found");
}
