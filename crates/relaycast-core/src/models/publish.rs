use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Visibility of the published video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Public => "public",
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query string of `POST /upload`
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PublishQuery {
    /// Subject id of the authorized user
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Request to publish a remotely hosted video
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct PublishRequest {
    /// URL of the source video; must declare a Content-Length
    #[validate(
        required(message = "video_url is required"),
        url(message = "video_url must be a valid URL")
    )]
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Platform category identifier (e.g. "22")
    #[serde(default, deserialize_with = "string_or_number")]
    pub category_id: Option<String>,
    #[serde(default)]
    pub privacy_status: PrivacyStatus,
    /// Scheduled publish time; only honoured by the platform for private videos
    #[serde(default)]
    pub publish_at: Option<DateTime<Utc>>,
}

impl PublishRequest {
    pub fn metadata(&self) -> PublishMetadata {
        PublishMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            category_id: self.category_id.clone(),
            privacy_status: self.privacy_status,
            publish_at: self.publish_at,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Raw::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Metadata handed to the publish client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: Option<String>,
    pub privacy_status: PrivacyStatus,
    pub publish_at: Option<DateTime<Utc>>,
}

/// Response of a successful publish
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishResponse {
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub message: String,
    /// Watch URL of the published video
    pub url: String,
}

/// Response of the OAuth callback
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthCallbackResponse {
    pub message: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}
