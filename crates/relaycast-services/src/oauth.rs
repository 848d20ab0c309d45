//! OAuth 2.0 client for the authorization provider
//!
//! Covers the three calls the service makes: building the consent URL,
//! exchanging an authorization code and refreshing an access token.

use chrono::{DateTime, Duration, Utc};
use relaycast_core::Config;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

pub const UPLOAD_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/youtube.upload",
    "openid",
    "email",
];

#[derive(Debug, Error)]
pub enum OAuthError {
    /// The refresh token or code is invalid, expired or revoked.
    #[error("Grant rejected by provider: {0}")]
    InvalidGrant(String),

    #[error("Provider returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to reach provider: {0}")]
    Transport(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("OAuth configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl OAuthSettings {
    pub fn from_config(config: &Config) -> Self {
        OAuthSettings {
            client_id: config.google_client_id().to_string(),
            client_secret: config.google_client_secret().to_string(),
            redirect_uri: config.google_redirect_uri().to_string(),
            auth_url: config.oauth_auth_url().to_string(),
            token_url: config.oauth_token_url().to_string(),
            userinfo_url: config.oauth_userinfo_url().to_string(),
        }
    }
}

/// Tokens issued by the provider.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity of the authenticated user
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    /// Stable subject id
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ProviderError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Clone)]
pub struct OAuthClient {
    client: reqwest::Client,
    settings: OAuthSettings,
}

impl OAuthClient {
    pub fn new(client: reqwest::Client, settings: OAuthSettings) -> Self {
        OAuthClient { client, settings }
    }

    pub fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Consent screen URL requesting offline access, so the provider issues
    /// a refresh token on every grant.
    pub fn authorization_url(&self, state: &str) -> Result<Url, OAuthError> {
        let scope = UPLOAD_SCOPES.join(" ");
        Url::parse_with_params(
            &self.settings.auth_url,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("include_granted_scopes", "true"),
                ("state", state),
            ],
        )
        .map_err(|e| OAuthError::Config(format!("Invalid authorization URL: {}", e)))
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, OAuthError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ])
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ])
        .await
    }

    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo, OAuthError> {
        let response = self
            .client
            .get(&self.settings.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<UserInfo>()
            .await
            .map_err(|e| OAuthError::InvalidResponse(e.to_string()))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, OAuthError> {
        let requested_at = Utc::now();
        let response = self
            .client
            .post(&self.settings.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| OAuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<ProviderError>(&body) {
                if err.error == "invalid_grant" {
                    return Err(OAuthError::InvalidGrant(
                        err.error_description.unwrap_or(err.error),
                    ));
                }
            }
            return Err(OAuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| OAuthError::InvalidResponse(e.to_string()))?;

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .map(|secs| requested_at + Duration::seconds(secs)),
        })
    }
}
