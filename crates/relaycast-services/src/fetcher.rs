//! Remote source fetcher
//!
//! Opens a forward-only byte stream against a source URL. A source must
//! declare its total length up front: staging writes a sized object, and an
//! undeclared length would mean buffering without bound.

use crate::ssrf::UrlPolicy;
use async_trait::async_trait;
use futures::TryStreamExt;
use relaycast_core::ByteStream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::redirect;
use std::io;
use std::time::Duration;
use thiserror::Error;

const MAX_REDIRECTS: usize = 5;
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Source URL rejected: {0}")]
    InvalidUrl(String),

    #[error("Source {url} did not declare a Content-Length")]
    LengthUnknown { url: String },

    #[error("Source declares {declared} bytes, above the {limit} byte limit")]
    TooLarge { declared: u64, limit: u64 },

    #[error("Source {url} is empty")]
    Empty { url: String },

    #[error("Source responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to reach source: {0}")]
    Transport(String),
}

/// An opened source: its byte stream plus the length it declared.
pub struct FetchedSource {
    pub stream: ByteStream,
    pub length: u64,
    pub content_type: Option<String>,
}

impl std::fmt::Debug for FetchedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedSource")
            .field("length", &self.length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Issue the read request. Succeeds only when the response carries an
    /// explicit, parseable total length.
    async fn open(&self, url: &str) -> Result<FetchedSource, FetchError>;
}

/// [`RemoteFetcher`] over HTTP(S) using reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: UrlPolicy,
    max_bytes: u64,
    header_timeout: Duration,
}

impl HttpFetcher {
    /// `header_timeout` bounds connecting and receiving response headers; the
    /// body itself is bounded by the run timeout.
    pub fn new(
        policy: UrlPolicy,
        max_bytes: u64,
        header_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let redirect_policy = policy.clone();
        let client = reqwest::Client::builder()
            .connect_timeout(header_timeout)
            .redirect(redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= MAX_REDIRECTS {
                    return attempt.error("too many redirects");
                }
                match redirect_policy.screen(attempt.url()) {
                    Ok(_) => attempt.follow(),
                    Err(reason) => attempt.error(reason),
                }
            }))
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpFetcher {
            client,
            policy,
            max_bytes,
            header_timeout,
        })
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn open(&self, url: &str) -> Result<FetchedSource, FetchError> {
        let start = std::time::Instant::now();
        let parsed = self.policy.check(url).await.map_err(FetchError::InvalidUrl)?;

        let response = tokio::time::timeout(self.header_timeout, self.client.get(parsed).send())
            .await
            .map_err(|_| {
                FetchError::Transport(format!(
                    "No response from source within {}s",
                    self.header_timeout.as_secs()
                ))
            })?
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                url = %url,
                status = status.as_u16(),
                "Source responded with non-success status"
            );
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        // The header is read directly: `Response::content_length` can report
        // a size hint for bodies whose length was never declared.
        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| FetchError::LengthUnknown {
                url: url.to_string(),
            })?;

        if length == 0 {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }
        if length > self.max_bytes {
            return Err(FetchError::TooLarge {
                declared: length,
                limit: self.max_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        tracing::debug!(
            url = %url,
            size_bytes = length,
            content_type = ?content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Opened remote source"
        );

        let stream = response.bytes_stream().map_err(io::Error::other);

        Ok(FetchedSource {
            stream: Box::pin(stream),
            length,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn fetcher(max_bytes: u64) -> HttpFetcher {
        HttpFetcher::new(
            UrlPolicy::new(true, None),
            max_bytes,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_open_with_declared_length() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a.mp4")
            .with_status(200)
            .with_header("content-type", "video/mp4")
            .with_body("0123456789")
            .create_async()
            .await;

        let source = fetcher(1024)
            .open(&format!("{}/a.mp4", server.url()))
            .await
            .unwrap();

        assert_eq!(source.length, 10);
        assert_eq!(source.content_type.as_deref(), Some("video/mp4"));
        assert_eq!(collect(source.stream).await, b"0123456789");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chunked_source_is_length_unknown() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/live.mp4")
            .with_status(200)
            .with_chunked_body(|w| w.write_all(b"some bytes"))
            .create_async()
            .await;

        let err = fetcher(1024)
            .open(&format!("{}/live.mp4", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::LengthUnknown { .. }));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.mp4")
            .with_status(404)
            .with_body("no such file")
            .create_async()
            .await;

        let err = fetcher(1024)
            .open(&format!("{}/missing.mp4", server.url()))
            .await
            .unwrap_err();

        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no such file");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_declared_length_over_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/big.mp4")
            .with_status(200)
            .with_body(vec![0u8; 64])
            .create_async()
            .await;

        let err = fetcher(16)
            .open(&format!("{}/big.mp4", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FetchError::TooLarge {
                declared: 64,
                limit: 16
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_source_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/empty.mp4")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let err = fetcher(16)
            .open(&format!("{}/empty.mp4", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Empty { .. }));
    }

    #[tokio::test]
    async fn test_private_source_rejected_before_request() {
        let strict = HttpFetcher::new(UrlPolicy::new(false, None), 1024, Duration::from_secs(5))
            .unwrap();

        let err = strict.open("http://127.0.0.1:1/a.mp4").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
