use chrono::{DateTime, Utc};
use relaycast_core::models::{CredentialRecord, PrivacyStatus, PublishRequest};

/// A stored credential for `subject_id` with the given access-token expiry.
pub fn credential(subject_id: &str, expires_at: Option<DateTime<Utc>>) -> CredentialRecord {
    let now = Utc::now();
    CredentialRecord {
        subject_id: subject_id.to_string(),
        email: Some(format!("{}@example.com", subject_id)),
        access_token: format!("access-{}", subject_id),
        refresh_token: Some(format!("refresh-{}", subject_id)),
        expires_at,
        created_at: now,
        updated_at: now,
    }
}

/// A minimal private publish request for `video_url`.
pub fn request(video_url: &str) -> PublishRequest {
    PublishRequest {
        video_url: Some(video_url.to_string()),
        title: "T".to_string(),
        description: "Uploaded by a test".to_string(),
        tags: vec!["test".to_string()],
        category_id: Some("22".to_string()),
        privacy_status: PrivacyStatus::Private,
        publish_at: None,
    }
}
