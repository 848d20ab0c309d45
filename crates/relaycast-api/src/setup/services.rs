//! Collaborator wiring
//!
//! Builds the process-wide clients once (HTTP client, credential repository,
//! staging storage) and hands them to the pipeline by `Arc`.

use crate::state::{AppState, OAuthStateStore};
use anyhow::{Context, Result};
use relaycast_core::{Config, EncryptionService};
use relaycast_db::{CredentialStore, PgCredentialRepository};
use relaycast_pipeline::{PipelineSettings, PublishPipeline};
use relaycast_services::{
    HttpFetcher, OAuthClient, OAuthSettings, PublishClient, RemoteFetcher, UrlPolicy,
    YouTubeClient,
};
use relaycast_storage::{ObjectStager, Storage, StorageStager};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER_CONNECT_TIMEOUT_SECS: u64 = 30;

pub fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let encryption = EncryptionService::from_base64_key(config.encryption_key())
        .context("Failed to initialize token encryption")?;
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(PgCredentialRepository::new(pool, encryption));

    // Shared by the OAuth and publish clients. No overall timeout: uploads
    // are bounded by the run timeout instead.
    let provider_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(PROVIDER_CONNECT_TIMEOUT_SECS))
        .user_agent(concat!("relaycast/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let oauth = OAuthClient::new(provider_client.clone(), OAuthSettings::from_config(config));
    let publisher: Arc<dyn PublishClient> = Arc::new(YouTubeClient::new(
        provider_client,
        oauth.clone(),
        config.youtube_upload_base_url(),
        config.youtube_watch_base_url(),
    ));

    let policy = UrlPolicy::new(
        config.allow_private_source_ips(),
        config.url_upload_allowlist().map(<[String]>::to_vec),
    );
    if policy.allow_private_ips {
        tracing::warn!("ALLOW_PRIVATE_SOURCE_IPS is set; sources on private networks are reachable");
    }
    let fetcher: Arc<dyn RemoteFetcher> = Arc::new(
        HttpFetcher::new(
            policy,
            config.max_source_size_bytes(),
            Duration::from_secs(config.fetch_timeout_secs()),
        )
        .context("Failed to build source fetcher")?,
    );

    let mut stager = StorageStager::new(storage, config.staging_prefix());
    if let Some(dir) = config.artifact_dir() {
        stager = stager.with_artifact_dir(dir);
    }
    let stager: Arc<dyn ObjectStager> = Arc::new(stager);

    let settings = PipelineSettings::from_config(config);
    tracing::info!(
        run_timeout_secs = ?settings.run_timeout.map(|t| t.as_secs()),
        refresh_skew_secs = settings.refresh_skew.num_seconds(),
        max_source_mb = config.max_source_size_bytes() / 1024 / 1024,
        "Publish pipeline configured"
    );

    let pipeline = PublishPipeline::new(credentials.clone(), fetcher, stager, publisher, settings);

    Ok(Arc::new(AppState {
        config: config.clone(),
        credentials,
        pipeline,
        oauth,
        oauth_states: OAuthStateStore::default(),
    }))
}
