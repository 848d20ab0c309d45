//! Relaycast Services Layer
//!
//! Clients for the external systems a publish run talks to: the remote
//! source host, the authorization provider and the video platform.

pub mod fetcher;
pub mod oauth;
pub mod ssrf;
pub mod youtube;

pub use fetcher::{FetchError, FetchedSource, HttpFetcher, RemoteFetcher};
pub use oauth::{OAuthClient, OAuthError, OAuthSettings, TokenGrant, UserInfo};
pub use ssrf::UrlPolicy;
pub use youtube::{PublishClient, PublishError, PublishedVideo, YouTubeClient};
