//! Consent flow integration tests.
//!
//! Run with: `cargo test -p relaycast-api --test auth_test`

mod helpers;

use axum::http::StatusCode;
use axum_test::TestServer;
use helpers::TestAppBuilder;
use mockito::Matcher;
use reqwest::Url;

/// Follow `/auth/login` and return the `state` it issued.
async fn issue_state(client: &TestServer) -> String {
    let response = client.get("/auth/login").await;
    response.assert_status(StatusCode::TEMPORARY_REDIRECT);

    let location = response.header("location");
    let url = Url::parse(location.to_str().unwrap()).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("state parameter")
}

async fn mock_provider(server: &mut mockito::ServerGuard) {
    server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            Matcher::UrlEncoded("code".into(), "auth-code".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"at-1","expires_in":3599,"refresh_token":"rt-1","token_type":"Bearer"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/v1/userinfo")
        .match_header("authorization", "Bearer at-1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"sub":"google-sub-1","email":"user@example.com"}"#)
        .create_async()
        .await;
}

#[tokio::test]
async fn test_login_redirects_to_consent_screen() {
    let provider = mockito::Server::new_async().await;
    let app = TestAppBuilder::new().provider_url(&provider.url()).build();

    let response = app.client().get("/auth/login").await;

    response.assert_status(StatusCode::TEMPORARY_REDIRECT);
    let location = response.header("location");
    let url = Url::parse(location.to_str().unwrap()).unwrap();
    assert!(url.as_str().starts_with(&format!("{}/o/oauth2/v2/auth", provider.url())));

    let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
    assert_eq!(params["access_type"], "offline");
    assert_eq!(params["prompt"], "consent");
    assert_eq!(params["client_id"], "client-id");
    assert!(params["scope"].contains("youtube.upload"));
    assert!(!params["state"].is_empty());
}

#[tokio::test]
async fn test_callback_stores_credential() {
    let mut provider = mockito::Server::new_async().await;
    mock_provider(&mut provider).await;
    let app = TestAppBuilder::new().provider_url(&provider.url()).build();
    let state = issue_state(app.client()).await;

    let response = app
        .client()
        .get("/auth/callback")
        .add_query_param("code", "auth-code")
        .add_query_param("state", &state)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["userId"], "google-sub-1");
    assert!(body["message"].as_str().is_some());

    let stored = app.store.record("google-sub-1").expect("stored credential");
    assert_eq!(stored.access_token, "at-1");
    assert_eq!(stored.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(stored.email.as_deref(), Some("user@example.com"));
    assert!(stored.expires_at.is_some());
}

#[tokio::test]
async fn test_callback_state_is_single_use() {
    let mut provider = mockito::Server::new_async().await;
    mock_provider(&mut provider).await;
    let app = TestAppBuilder::new().provider_url(&provider.url()).build();
    let state = issue_state(app.client()).await;

    app.client()
        .get("/auth/callback")
        .add_query_param("code", "auth-code")
        .add_query_param("state", &state)
        .await
        .assert_status_ok();

    let replay = app
        .client()
        .get("/auth/callback")
        .add_query_param("code", "auth-code")
        .add_query_param("state", &state)
        .await;
    replay.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_with_unknown_state_is_rejected() {
    let app = TestAppBuilder::new().build();

    let response = app
        .client()
        .get("/auth/callback")
        .add_query_param("code", "auth-code")
        .add_query_param("state", "forged")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(app.store.record("google-sub-1").is_none());
}

#[tokio::test]
async fn test_callback_without_code_is_rejected() {
    let app = TestAppBuilder::new().build();
    let state = issue_state(app.client()).await;

    let response = app
        .client()
        .get("/auth/callback")
        .add_query_param("state", &state)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_declined_consent_is_rejected() {
    let app = TestAppBuilder::new().build();

    let response = app
        .client()
        .get("/auth/callback")
        .add_query_param("error", "access_denied")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rejected_code_is_bad_request() {
    let mut provider = mockito::Server::new_async().await;
    provider
        .mock("POST", "/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant","error_description":"Bad Request"}"#)
        .create_async()
        .await;
    let app = TestAppBuilder::new().provider_url(&provider.url()).build();
    let state = issue_state(app.client()).await;

    let response = app
        .client()
        .get("/auth/callback")
        .add_query_param("code", "stale-code")
        .add_query_param("state", &state)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
