use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Lifetime assumed for a refreshed access token whose expiry was not reported.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Delegated credential of one authorized user. At most one per subject id.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub subject_id: String,
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// True when the access token is expired or will be within `skew`.
    /// A record without a known expiry is treated as stale.
    pub fn needs_refresh(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - skew <= now,
            None => true,
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("subject_id", &self.subject_id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Fields written by an upsert. A `None` refresh token keeps the stored one.
#[derive(Clone)]
pub struct CredentialUpsert {
    pub subject_id: String,
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for CredentialUpsert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialUpsert")
            .field("subject_id", &self.subject_id)
            .field("email", &self.email)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of exchanging a refresh token for a new access token.
#[derive(Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Some providers rotate the refresh token on use.
    pub refresh_token: Option<String>,
}

impl RefreshedToken {
    /// The reported expiry, or `now` plus the default lifetime when none was given.
    pub fn expiry_or_default(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.expires_at
            .unwrap_or_else(|| now + Duration::seconds(DEFAULT_ACCESS_TOKEN_LIFETIME_SECS))
    }

    /// Same token with a concrete expiry.
    pub fn with_default_expiry(mut self, now: DateTime<Utc>) -> Self {
        self.expires_at = Some(self.expiry_or_default(now));
        self
    }
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("expires_at", &self.expires_at)
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

impl CredentialRecord {
    /// Copy of this record with a refreshed access token applied.
    pub fn with_refreshed(&self, token: &RefreshedToken, now: DateTime<Utc>) -> Self {
        CredentialRecord {
            access_token: token.access_token.clone(),
            refresh_token: token
                .refresh_token
                .clone()
                .or_else(|| self.refresh_token.clone()),
            expires_at: Some(token.expiry_or_default(now)),
            updated_at: now,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expires_at: Option<DateTime<Utc>>) -> CredentialRecord {
        let now = Utc::now();
        CredentialRecord {
            subject_id: "sub-1".to_string(),
            email: Some("user@example.com".to_string()),
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_needs_refresh() {
        let now = Utc::now();
        let skew = Duration::seconds(60);

        assert!(!record(Some(now + Duration::hours(1))).needs_refresh(now, skew));
        assert!(record(Some(now + Duration::seconds(30))).needs_refresh(now, skew));
        assert!(record(Some(now - Duration::seconds(1))).needs_refresh(now, skew));
        assert!(record(None).needs_refresh(now, skew));
    }

    #[test]
    fn test_with_refreshed_keeps_refresh_token_unless_rotated() {
        let now = Utc::now();
        let original = record(Some(now));
        let refreshed = original.with_refreshed(
            &RefreshedToken {
                access_token: "new-access".to_string(),
                expires_at: Some(now + Duration::hours(1)),
                refresh_token: None,
            },
            now,
        );
        assert_eq!(refreshed.access_token, "new-access");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(refreshed.subject_id, "sub-1");

        let rotated = original.with_refreshed(
            &RefreshedToken {
                access_token: "a2".to_string(),
                expires_at: None,
                refresh_token: Some("r2".to_string()),
            },
            now,
        );
        assert_eq!(rotated.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", record(None));
        assert!(!debug.contains("access\""));
        assert!(!debug.contains("\"refresh\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_refreshed_token_without_expiry_gets_default_lifetime() {
        let now = Utc::now();
        let token = RefreshedToken {
            access_token: "new-access".to_string(),
            expires_at: None,
            refresh_token: None,
        };

        let refreshed = record(None).with_refreshed(&token, now);
        assert_eq!(refreshed.expires_at, Some(now + Duration::hours(1)));
        assert!(!refreshed.needs_refresh(now, Duration::seconds(60)));

        let normalized = token.with_default_expiry(now);
        assert_eq!(normalized.expires_at, Some(now + Duration::hours(1)));
    }
}
