//! Error types module
//!
//! All failures that can reach a caller are unified under [`AppError`]. Each
//! variant self-describes its HTTP presentation through [`ErrorMetadata`], so
//! the API layer never needs to match on individual variants.
//!
//! The `Database` variant carries a `sqlx::Error` when the `sqlx` feature is
//! enabled and a plain message otherwise.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Recoverable or caller-caused issues
    Warn,
    /// Unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "FETCH_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether a caller may retry the same request
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// No subject id accompanied the request.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The subject is known to the caller but has no stored credential.
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Source length unknown: {0}")]
    LengthUnknown(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Storage write error: {0}")]
    StorageWrite(String),

    #[error("Storage read error: {0}")]
    StorageRead(String),

    /// The refresh token was rejected; the user must authorize again.
    #[error("Authorization expired: {0}")]
    AuthExpired(String),

    /// The destination platform rejected the publish call. `details` holds
    /// the upstream error payload when one was returned.
    #[error("Publish error: {message}")]
    Publish {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Upstream authorization error: {0}")]
    OAuth(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Unauthenticated(_) => (
            401,
            "UNAUTHENTICATED",
            false,
            Some("Supply the userId of an authorized user"),
            false,
            LogLevel::Debug,
        ),
        AppError::CredentialNotFound(_) => (
            401,
            "CREDENTIAL_NOT_FOUND",
            false,
            Some("Authorize the account via /auth/login first"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::LengthUnknown(_) => (
            500,
            "LENGTH_UNKNOWN",
            false,
            Some("Serve the source with a Content-Length header"),
            false,
            LogLevel::Warn,
        ),
        AppError::Fetch(_) => (
            500,
            "FETCH_ERROR",
            true,
            Some("Verify the source URL is reachable and retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::StorageWrite(_) => (
            500,
            "STORAGE_WRITE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::StorageRead(_) => (
            500,
            "STORAGE_READ_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::AuthExpired(_) => (
            401,
            "AUTH_EXPIRED",
            false,
            Some("Re-authorize the account via /auth/login"),
            false,
            LogLevel::Warn,
        ),
        AppError::Publish { .. } => (
            500,
            "PUBLISH_ERROR",
            true,
            Some("Inspect details for the platform's reason"),
            false,
            LogLevel::Warn,
        ),
        AppError::Timeout(_) => (
            504,
            "TIMEOUT",
            true,
            Some("Retry with a smaller source or later"),
            false,
            LogLevel::Warn,
        ),
        AppError::OAuth(_) => (
            502,
            "OAUTH_ERROR",
            true,
            Some("Restart the authorization flow"),
            false,
            LogLevel::Warn,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Unauthenticated(_) => "Unauthenticated",
            AppError::CredentialNotFound(_) => "NotFound",
            AppError::InvalidInput(_) => "Validation",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::LengthUnknown(_) => "LengthUnknown",
            AppError::Fetch(_) => "FetchError",
            AppError::StorageWrite(_) => "StorageWriteError",
            AppError::StorageRead(_) => "StorageReadError",
            AppError::AuthExpired(_) => "AuthExpired",
            AppError::Publish { .. } => "PublishError",
            AppError::Timeout(_) => "Timeout",
            AppError::OAuth(_) => "OAuth",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Upstream payload attached to the error, if any.
    pub fn upstream_details(&self) -> Option<&serde_json::Value> {
        match self {
            AppError::Publish { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Unauthenticated(ref msg) => msg.clone(),
            AppError::CredentialNotFound(ref msg) => msg.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::BadRequest(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::LengthUnknown(ref msg) => msg.clone(),
            AppError::Fetch(ref msg) => format!("Failed to fetch source video: {}", msg),
            AppError::StorageWrite(_) => "Failed to stage source video".to_string(),
            AppError::StorageRead(_) => "Failed to read staged video".to_string(),
            AppError::AuthExpired(_) => {
                "Authorization has expired or was revoked; please re-authorize".to_string()
            }
            AppError::Publish { ref message, .. } => {
                format!("Failed to publish video: {}", message)
            }
            AppError::Timeout(ref msg) => msg.clone(),
            AppError::OAuth(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_missing_subject_and_credential_are_401() {
        let err = AppError::Unauthenticated("userId is required".to_string());
        assert_eq!(err.http_status_code(), 401);
        assert_eq!(err.client_message(), "userId is required");

        let err = AppError::CredentialNotFound("No credentials for user".to_string());
        assert_eq!(err.http_status_code(), 401);
        assert_eq!(err.error_type(), "NotFound");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_validation_is_400() {
        let err = AppError::InvalidInput("video_url is required".to_string());
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_publish_error_carries_upstream_details() {
        let payload = serde_json::json!({"error": {"code": 403, "errors": [{"reason": "quotaExceeded"}]}});
        let err = AppError::Publish {
            message: "quota exceeded".to_string(),
            details: Some(payload.clone()),
        };
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "PUBLISH_ERROR");
        assert_eq!(err.upstream_details(), Some(&payload));
        assert!(!err.is_sensitive());
        assert!(err.client_message().contains("quota exceeded"));
    }

    #[test]
    fn test_auth_expired_is_terminal() {
        let err = AppError::AuthExpired("invalid_grant".to_string());
        assert_eq!(err.http_status_code(), 401);
        assert!(!err.is_recoverable());
        assert_eq!(
            err.suggested_action(),
            Some("Re-authorize the account via /auth/login")
        );
        assert!(err.upstream_details().is_none());
    }

    #[test]
    fn test_pipeline_failures_map_to_500() {
        for err in [
            AppError::LengthUnknown("no length".to_string()),
            AppError::Fetch("connection reset".to_string()),
            AppError::StorageWrite("quota".to_string()),
            AppError::StorageRead("missing".to_string()),
        ] {
            assert_eq!(err.http_status_code(), 500, "{}", err.error_type());
        }
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("root cause").context("outer"));
        let detailed = err.detailed_message();
        assert!(detailed.starts_with("Internal error with source"));
        assert!(detailed.contains("Caused by: outer"));
    }
}
