//! Publish endpoint integration tests.
//!
//! Run with: `cargo test -p relaycast-api --test upload_test`

mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use helpers::{setup_test_app, upload_body, TestAppBuilder, SOURCE_URL};
use relaycast_pipeline::test_helpers::{credential, FakePublisher, InMemoryStager};

#[tokio::test]
async fn test_upload_publishes_and_releases_staged_object() {
    let app = setup_test_app();
    app.store
        .insert(credential("sub-1", Some(Utc::now() + Duration::hours(1))));
    app.fetcher.serve(SOURCE_URL, vec![7u8; 12345]);

    let response = app
        .client()
        .post("/upload")
        .add_query_param("userId", "sub-1")
        .json(&upload_body(SOURCE_URL))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["videoId"], "video-1");
    assert_eq!(body["message"], "Video uploaded successfully");
    assert_eq!(body["url"], "https://www.youtube.com/watch?v=video-1");

    assert_eq!(app.publisher.published_sizes(), vec![12345]);
    let deleted = app.stager.deleted_keys();
    assert_eq!(deleted.len(), 1);
    assert!(!app.stager.contains(&deleted[0]));
    for path in app.stager.artifact_paths() {
        assert!(!path.exists());
    }
}

#[tokio::test]
async fn test_upload_without_user_id_is_unauthenticated() {
    let app = setup_test_app();
    app.fetcher.serve(SOURCE_URL, vec![7u8; 10]);

    let response = app
        .client()
        .post("/upload")
        .json(&upload_body(SOURCE_URL))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "UNAUTHENTICATED");
    assert!(body["error"].as_str().is_some());
    assert_eq!(app.fetcher.open_calls(), 0);
    assert_eq!(app.stager.stage_calls(), 0);
    assert_eq!(app.publisher.publish_calls(), 0);
}

#[tokio::test]
async fn test_upload_for_unknown_user_is_unauthorized() {
    let app = setup_test_app();
    app.fetcher.serve(SOURCE_URL, vec![7u8; 10]);

    let response = app
        .client()
        .post("/upload")
        .add_query_param("userId", "nobody")
        .json(&upload_body(SOURCE_URL))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "CREDENTIAL_NOT_FOUND");
    assert_eq!(app.fetcher.open_calls(), 0);
}

#[tokio::test]
async fn test_upload_without_video_url_is_bad_request() {
    let app = setup_test_app();
    app.store
        .insert(credential("sub-1", Some(Utc::now() + Duration::hours(1))));

    let response = app
        .client()
        .post("/upload")
        .add_query_param("userId", "sub-1")
        .json(&serde_json::json!({"title": "T", "privacy_status": "private"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(app.fetcher.open_calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/upload")
        .add_query_param("userId", "sub-1")
        .json(&serde_json::json!({"video_url": SOURCE_URL, "privacy_status": "secret"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_missing_user_id_outranks_malformed_body() {
    let app = setup_test_app();

    let response = app
        .client()
        .post("/upload")
        .json(&serde_json::json!({"video_url": SOURCE_URL, "privacy_status": "secret"}))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let response = app
        .client()
        .post("/upload")
        .add_query_param("userId", "  ")
        .text("not json")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(app.fetcher.open_calls(), 0);
}

#[tokio::test]
async fn test_source_without_length_is_never_staged() {
    let app = setup_test_app();
    app.store
        .insert(credential("sub-1", Some(Utc::now() + Duration::hours(1))));
    app.fetcher.serve_without_length(SOURCE_URL, vec![7u8; 12345]);

    let response = app
        .client()
        .post("/upload")
        .add_query_param("userId", "sub-1")
        .json(&upload_body(SOURCE_URL))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "LENGTH_UNKNOWN");
    assert_eq!(app.stager.stage_calls(), 0);
    assert!(app.stager.deleted_keys().is_empty());
}

#[tokio::test]
async fn test_quota_error_carries_upstream_details_and_cleans_up() {
    let app = TestAppBuilder::new()
        .publisher(FakePublisher::new().quota_exceeded())
        .build();
    app.store
        .insert(credential("sub-1", Some(Utc::now() + Duration::hours(1))));
    app.fetcher.serve(SOURCE_URL, vec![7u8; 4096]);

    let response = app
        .client()
        .post("/upload")
        .add_query_param("userId", "sub-1")
        .json(&upload_body(SOURCE_URL))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "PUBLISH_ERROR");
    assert_eq!(
        body["details"]["error"]["errors"][0]["reason"],
        "quotaExceeded"
    );

    let deleted = app.stager.deleted_keys();
    assert_eq!(deleted.len(), 1);
    assert!(!app.stager.contains(&deleted[0]));
    for path in app.stager.artifact_paths() {
        assert!(!path.exists());
    }
}

#[tokio::test]
async fn test_revoked_refresh_token_requires_reauthorization() {
    let app = TestAppBuilder::new()
        .publisher(FakePublisher::new().revoked())
        .build();
    app.store
        .insert(credential("sub-1", Some(Utc::now() - Duration::minutes(5))));
    app.fetcher.serve(SOURCE_URL, vec![7u8; 4096]);

    let response = app
        .client()
        .post("/upload")
        .add_query_param("userId", "sub-1")
        .json(&upload_body(SOURCE_URL))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "AUTH_EXPIRED");
    assert_eq!(app.publisher.refresh_calls(), 1);
    assert_eq!(app.publisher.publish_calls(), 0);
    assert_eq!(app.stager.deleted_keys().len(), 1);
}

#[tokio::test]
async fn test_delete_failure_does_not_fail_upload() {
    let app = TestAppBuilder::new()
        .stager(InMemoryStager::new().failing_delete())
        .build();
    app.store
        .insert(credential("sub-1", Some(Utc::now() + Duration::hours(1))));
    app.fetcher.serve(SOURCE_URL, vec![7u8; 100]);

    let response = app
        .client()
        .post("/upload")
        .add_query_param("userId", "sub-1")
        .json(&upload_body(SOURCE_URL))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["videoId"], "video-1");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = setup_test_app();

    let response = app
        .client()
        .get("/health")
        .add_header("x-request-id", "req-123")
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("x-request-id"), "req-123");
}
