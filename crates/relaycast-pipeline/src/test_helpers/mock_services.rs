//! Fake remote fetcher and publish client

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use futures::StreamExt;
use relaycast_core::models::{CredentialRecord, PublishMetadata, RefreshedToken};
use relaycast_core::ByteStream;
use relaycast_services::{
    FetchError, FetchedSource, PublishClient, PublishError, PublishedVideo, RemoteFetcher,
};
use relaycast_storage::LocalArtifact;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const CHUNK_SIZE: usize = 1024;

#[derive(Clone)]
struct FakeSource {
    body: Vec<u8>,
    declared_length: Option<u64>,
    stalls: bool,
}

/// Serves registered URLs from memory. Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeFetcher {
    sources: Mutex<HashMap<String, FakeSource>>,
    open_calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with its exact length declared.
    pub fn serve(&self, url: &str, body: Vec<u8>) {
        let declared_length = Some(body.len() as u64);
        self.register(url, body, declared_length);
    }

    /// Serve `body` without declaring a length.
    pub fn serve_without_length(&self, url: &str, body: Vec<u8>) {
        self.register(url, body, None);
    }

    /// Declare `declared_length` but send only `body`.
    pub fn serve_truncated(&self, url: &str, declared_length: u64, body: Vec<u8>) {
        self.register(url, body, Some(declared_length));
    }

    /// Declare `declared_length`, send `head`, then never send anything else.
    pub fn serve_stalled(&self, url: &str, declared_length: u64, head: Vec<u8>) {
        self.sources.lock().unwrap().insert(
            url.to_string(),
            FakeSource {
                body: head,
                declared_length: Some(declared_length),
                stalls: true,
            },
        );
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    fn register(&self, url: &str, body: Vec<u8>, declared_length: Option<u64>) {
        self.sources.lock().unwrap().insert(
            url.to_string(),
            FakeSource {
                body,
                declared_length,
                stalls: false,
            },
        );
    }
}

#[async_trait]
impl RemoteFetcher for FakeFetcher {
    async fn open(&self, url: &str) -> Result<FetchedSource, FetchError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let source = self
            .sources
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(FetchError::Status {
                status: 404,
                body: "not found".to_string(),
            })?;

        let length = source.declared_length.ok_or_else(|| FetchError::LengthUnknown {
            url: url.to_string(),
        })?;

        let chunks: Vec<io::Result<Bytes>> = source
            .body
            .chunks(CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        let body = futures::stream::iter(chunks);
        let stream: ByteStream = if source.stalls {
            Box::pin(body.chain(futures::stream::pending()))
        } else {
            Box::pin(body)
        };

        Ok(FetchedSource {
            stream,
            length,
            content_type: Some("video/mp4".to_string()),
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PublishBehavior {
    Succeed,
    QuotaExceeded,
}

/// Publish client that records uploads instead of performing them.
pub struct FakePublisher {
    behavior: PublishBehavior,
    refresh_revoked: bool,
    refresh_reports_expiry: bool,
    refresh_calls: AtomicUsize,
    publish_calls: AtomicUsize,
    published_sizes: Mutex<Vec<u64>>,
    tokens_used: Mutex<Vec<String>>,
}

impl Default for FakePublisher {
    fn default() -> Self {
        FakePublisher {
            behavior: PublishBehavior::Succeed,
            refresh_revoked: false,
            refresh_reports_expiry: true,
            refresh_calls: AtomicUsize::new(0),
            publish_calls: AtomicUsize::new(0),
            published_sizes: Mutex::new(Vec::new()),
            tokens_used: Mutex::new(Vec::new()),
        }
    }
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refreshing fails as if the refresh token had been revoked.
    pub fn revoked(mut self) -> Self {
        self.refresh_revoked = true;
        self
    }

    /// Refreshed tokens come back without an expiry.
    pub fn without_expiry(mut self) -> Self {
        self.refresh_reports_expiry = false;
        self
    }

    /// Every upload is rejected with the platform's quota error.
    pub fn quota_exceeded(mut self) -> Self {
        self.behavior = PublishBehavior::QuotaExceeded;
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Sizes of the artifacts received, as read from disk during the call.
    pub fn published_sizes(&self) -> Vec<u64> {
        self.published_sizes.lock().unwrap().clone()
    }

    pub fn tokens_used(&self) -> Vec<String> {
        self.tokens_used.lock().unwrap().clone()
    }
}

#[async_trait]
impl PublishClient for FakePublisher {
    async fn refresh_access_token(
        &self,
        _credential: &CredentialRecord,
    ) -> Result<RefreshedToken, PublishError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.refresh_revoked {
            return Err(PublishError::AuthExpired(
                "Token has been expired or revoked.".to_string(),
            ));
        }
        Ok(RefreshedToken {
            access_token: format!("refreshed-access-{}", n),
            expires_at: self
                .refresh_reports_expiry
                .then(|| Utc::now() + Duration::hours(1)),
            refresh_token: None,
        })
    }

    async fn publish(
        &self,
        credential: &CredentialRecord,
        _metadata: &PublishMetadata,
        artifact: &LocalArtifact,
    ) -> Result<PublishedVideo, PublishError> {
        let n = self.publish_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.tokens_used
            .lock()
            .unwrap()
            .push(credential.access_token.clone());

        let on_disk = tokio::fs::metadata(artifact.path())
            .await
            .map_err(|e| PublishError::Artifact(e.to_string()))?
            .len();
        self.published_sizes.lock().unwrap().push(on_disk);

        match self.behavior {
            PublishBehavior::Succeed => {
                let video_id = format!("video-{}", n);
                Ok(PublishedVideo {
                    url: format!("https://www.youtube.com/watch?v={}", video_id),
                    video_id,
                })
            }
            PublishBehavior::QuotaExceeded => Err(PublishError::Upstream {
                status: Some(403),
                message: "The request cannot be completed because you have exceeded your quota."
                    .to_string(),
                payload: Some(serde_json::json!({
                    "error": {
                        "code": 403,
                        "message": "The request cannot be completed because you have exceeded your quota.",
                        "errors": [{"reason": "quotaExceeded", "domain": "youtube.quota"}]
                    }
                })),
            }),
        }
    }
}
