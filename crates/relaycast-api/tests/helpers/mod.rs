//! Test helpers: build AppState and router for integration tests.
//!
//! Collaborators are the in-memory fakes from `relaycast-pipeline`; the
//! authorization provider is whatever URL the test passes (usually a mockito
//! server). No database or object store is needed.
#![allow(dead_code)]

use axum_test::TestServer;
use relaycast_api::setup::routes;
use relaycast_api::state::{AppState, OAuthStateStore};
use relaycast_core::{Config, PublisherConfig};
use relaycast_db::CredentialStore;
use relaycast_pipeline::test_helpers::{
    FakeFetcher, FakePublisher, InMemoryCredentialStore, InMemoryStager,
};
use relaycast_pipeline::{PipelineSettings, PublishPipeline};
use relaycast_services::{OAuthClient, OAuthSettings};
use std::collections::HashMap;
use std::sync::Arc;

pub const SOURCE_URL: &str = "https://example.com/a.mp4";

/// Test application: server plus handles on every fake it was built with.
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryCredentialStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub stager: Arc<InMemoryStager>,
    pub publisher: Arc<FakePublisher>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Fakes to assemble the app from. Defaults succeed at everything.
pub struct TestAppBuilder {
    store: InMemoryCredentialStore,
    stager: InMemoryStager,
    publisher: FakePublisher,
    provider_url: String,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        TestAppBuilder {
            store: InMemoryCredentialStore::new(),
            stager: InMemoryStager::new(),
            publisher: FakePublisher::new(),
            // Nothing listens here; tests that reach the provider set their own.
            provider_url: "http://127.0.0.1:9".to_string(),
        }
    }

    pub fn store(mut self, store: InMemoryCredentialStore) -> Self {
        self.store = store;
        self
    }

    pub fn stager(mut self, stager: InMemoryStager) -> Self {
        self.stager = stager;
        self
    }

    pub fn publisher(mut self, publisher: FakePublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn provider_url(mut self, url: &str) -> Self {
        self.provider_url = url.to_string();
        self
    }

    pub fn build(self) -> TestApp {
        let config = test_config(&self.provider_url);

        let store = Arc::new(self.store);
        let fetcher = Arc::new(FakeFetcher::new());
        let stager = Arc::new(self.stager);
        let publisher = Arc::new(self.publisher);

        let credentials: Arc<dyn CredentialStore> = store.clone();
        let pipeline = PublishPipeline::new(
            credentials.clone(),
            fetcher.clone(),
            stager.clone(),
            publisher.clone(),
            PipelineSettings::default(),
        );
        let oauth = OAuthClient::new(reqwest::Client::new(), OAuthSettings::from_config(&config));

        let state = Arc::new(AppState {
            config: config.clone(),
            credentials,
            pipeline,
            oauth,
            oauth_states: OAuthStateStore::default(),
        });

        let router = routes::setup_routes(&config, state).expect("router");
        let server = TestServer::new(router).expect("test server");

        TestApp {
            server,
            store,
            fetcher,
            stager,
            publisher,
        }
    }
}

pub fn setup_test_app() -> TestApp {
    TestAppBuilder::new().build()
}

pub fn test_config(provider_url: &str) -> Config {
    let env = HashMap::from([
        ("DATABASE_URL", "postgresql://localhost/relaycast_test".to_string()),
        (
            "ENCRYPTION_KEY",
            "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string(),
        ),
        ("GOOGLE_CLIENT_ID", "client-id".to_string()),
        ("GOOGLE_CLIENT_SECRET", "client-secret".to_string()),
        (
            "GOOGLE_REDIRECT_URI",
            "http://localhost:3000/auth/callback".to_string(),
        ),
        (
            "OAUTH_AUTH_URL",
            format!("{}/o/oauth2/v2/auth", provider_url),
        ),
        ("OAUTH_TOKEN_URL", format!("{}/token", provider_url)),
        ("OAUTH_USERINFO_URL", format!("{}/v1/userinfo", provider_url)),
        ("STORAGE_BACKEND", "local".to_string()),
        ("LOCAL_STORAGE_PATH", "/tmp/relaycast-test".to_string()),
    ]);
    let config = PublisherConfig::from_lookup(|key| env.get(key).cloned()).expect("config");
    Config(Box::new(config))
}

/// JSON body of a minimal private upload for `video_url`.
pub fn upload_body(video_url: &str) -> serde_json::Value {
    serde_json::json!({
        "video_url": video_url,
        "title": "T",
        "description": "Uploaded by a test",
        "tags": ["test"],
        "category_id": "22",
        "privacy_status": "private"
    })
}
