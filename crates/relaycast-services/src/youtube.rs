//! Video platform publish client
//!
//! Publishes a local artifact through the platform's resumable upload
//! protocol: one JSON request creates the upload session and returns its URI
//! in `Location`, a second request streams the file bytes to that URI.

use crate::oauth::{OAuthClient, OAuthError};
use async_trait::async_trait;
use chrono::Utc;
use relaycast_core::models::{CredentialRecord, PrivacyStatus, PublishMetadata, RefreshedToken};
use relaycast_storage::LocalArtifact;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio_util::io::ReaderStream;

const VIDEO_CONTENT_TYPE: &str = "video/*";

#[derive(Debug, Error)]
pub enum PublishError {
    /// The refresh token is invalid or revoked. Terminal for the run.
    #[error("Authorization expired: {0}")]
    AuthExpired(String),

    /// Any other rejection; `payload` is the platform's error body when it was JSON.
    #[error("Platform rejected the request: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
        payload: Option<Value>,
    },

    #[error("Failed to read local artifact: {0}")]
    Artifact(String),
}

impl PublishError {
    fn transport(err: reqwest::Error) -> Self {
        PublishError::Upstream {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            payload: None,
        }
    }

    fn from_response_body(status: u16, body: &str) -> Self {
        let payload = serde_json::from_str::<Value>(body).ok();
        let message = payload
            .as_ref()
            .and_then(|p| p.pointer("/error/message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Platform returned status {}", status));
        PublishError::Upstream {
            status: Some(status),
            message,
            payload,
        }
    }
}

impl From<OAuthError> for PublishError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::InvalidGrant(reason) => PublishError::AuthExpired(reason),
            OAuthError::Rejected { status, body } => PublishError::from_response_body(status, &body),
            other => PublishError::Upstream {
                status: None,
                message: other.to_string(),
                payload: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVideo {
    pub video_id: String,
    pub url: String,
}

/// The destination platform's "create video" operation.
#[async_trait]
pub trait PublishClient: Send + Sync {
    /// Exchange the credential's refresh token for a new access token.
    /// Fails with [`PublishError::AuthExpired`] when the refresh token is
    /// missing, invalid or revoked.
    async fn refresh_access_token(
        &self,
        credential: &CredentialRecord,
    ) -> Result<RefreshedToken, PublishError>;

    /// Upload `artifact` with `metadata` using the credential's access token,
    /// which the caller has already refreshed if needed.
    async fn publish(
        &self,
        credential: &CredentialRecord,
        metadata: &PublishMetadata,
        artifact: &LocalArtifact,
    ) -> Result<PublishedVideo, PublishError>;
}

#[derive(Deserialize)]
struct VideoResource {
    id: String,
}

#[derive(Clone)]
pub struct YouTubeClient {
    client: reqwest::Client,
    oauth: OAuthClient,
    upload_base_url: String,
    watch_base_url: String,
}

impl YouTubeClient {
    pub fn new(
        client: reqwest::Client,
        oauth: OAuthClient,
        upload_base_url: impl Into<String>,
        watch_base_url: impl Into<String>,
    ) -> Self {
        YouTubeClient {
            client,
            oauth,
            upload_base_url: upload_base_url.into().trim_end_matches('/').to_string(),
            watch_base_url: watch_base_url.into(),
        }
    }

    fn resource_body(metadata: &PublishMetadata) -> Value {
        let mut snippet = json!({
            "title": metadata.title,
            "description": metadata.description,
            "tags": metadata.tags,
        });
        if let Some(category_id) = &metadata.category_id {
            snippet["categoryId"] = json!(category_id);
        }

        let mut status = json!({ "privacyStatus": metadata.privacy_status.as_str() });
        match (metadata.publish_at, metadata.privacy_status) {
            (Some(publish_at), PrivacyStatus::Private) => {
                status["publishAt"] = json!(publish_at.to_rfc3339());
            }
            (Some(_), other) => {
                tracing::warn!(
                    privacy_status = %other,
                    "Ignoring publish_at: scheduling requires a private video"
                );
            }
            (None, _) => {}
        }

        json!({ "snippet": snippet, "status": status })
    }

    /// Create the resumable session and return its upload URI.
    async fn start_session(
        &self,
        access_token: &str,
        metadata: &PublishMetadata,
        size: u64,
    ) -> Result<String, PublishError> {
        let response = self
            .client
            .post(format!("{}/videos", self.upload_base_url))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Type", VIDEO_CONTENT_TYPE)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&Self::resource_body(metadata))
            .send()
            .await
            .map_err(PublishError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::from_response_body(status.as_u16(), &body));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PublishError::Upstream {
                status: Some(status.as_u16()),
                message: "Upload session response carried no Location header".to_string(),
                payload: None,
            })
    }
}

#[async_trait]
impl PublishClient for YouTubeClient {
    async fn refresh_access_token(
        &self,
        credential: &CredentialRecord,
    ) -> Result<RefreshedToken, PublishError> {
        let refresh_token = credential.refresh_token.as_deref().ok_or_else(|| {
            PublishError::AuthExpired("No refresh token stored for this user".to_string())
        })?;

        let grant = self.oauth.refresh(refresh_token).await?;

        tracing::debug!(
            subject_id = %credential.subject_id,
            expires_at = ?grant.expires_at,
            "Access token refreshed"
        );

        Ok(RefreshedToken {
            access_token: grant.access_token,
            expires_at: grant.expires_at,
            refresh_token: grant.refresh_token,
        })
    }

    #[tracing::instrument(skip(self, credential, metadata, artifact), fields(subject_id = %credential.subject_id, size_bytes = artifact.size()))]
    async fn publish(
        &self,
        credential: &CredentialRecord,
        metadata: &PublishMetadata,
        artifact: &LocalArtifact,
    ) -> Result<PublishedVideo, PublishError> {
        let start = std::time::Instant::now();
        if credential
            .expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now())
        {
            tracing::warn!("Publishing with an access token past its recorded expiry");
        }

        let session_uri = self
            .start_session(&credential.access_token, metadata, artifact.size())
            .await?;

        let file = artifact
            .open()
            .await
            .map_err(|e| PublishError::Artifact(e.to_string()))?;

        let response = self
            .client
            .put(&session_uri)
            .bearer_auth(&credential.access_token)
            .header(CONTENT_TYPE, VIDEO_CONTENT_TYPE)
            .header(CONTENT_LENGTH, artifact.size())
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(PublishError::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(PublishError::transport)?;
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Video upload rejected"
            );
            return Err(PublishError::from_response_body(status.as_u16(), &body));
        }

        let video: VideoResource =
            serde_json::from_str(&body).map_err(|e| PublishError::Upstream {
                status: Some(status.as_u16()),
                message: format!("Unexpected upload response: {}", e),
                payload: serde_json::from_str(&body).ok(),
            })?;

        tracing::info!(
            video_id = %video.id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Video published"
        );

        Ok(PublishedVideo {
            url: format!("{}{}", self.watch_base_url, video.id),
            video_id: video.id,
        })
    }
}
