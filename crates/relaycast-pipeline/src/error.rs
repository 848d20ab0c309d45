//! Failure classification for publish runs
//!
//! Every failure is classified at the step where it originates. The API
//! layer presents it through [`AppError`].

use relaycast_core::AppError;
use relaycast_services::{FetchError, PublishError};
use relaycast_storage::StagerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No userId supplied")]
    Unauthenticated,

    #[error("No credentials stored for user {subject_id}")]
    NotFound { subject_id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    LengthUnknown(String),

    #[error("{0}")]
    Fetch(String),

    #[error("{0}")]
    StorageWrite(String),

    #[error("{0}")]
    StorageRead(String),

    #[error("{0}")]
    AuthExpired(String),

    #[error("{message}")]
    Publish {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Run exceeded its {after_secs}s time limit")]
    TimedOut { after_secs: u64 },

    /// The credential store itself failed (not a missing record).
    #[error("Credential store failure: {0}")]
    CredentialStore(#[source] AppError),
}

impl PipelineError {
    /// Taxonomy name used in run state and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Unauthenticated => "Unauthenticated",
            PipelineError::NotFound { .. } => "NotFound",
            PipelineError::Validation(_) => "Validation",
            PipelineError::LengthUnknown(_) => "LengthUnknown",
            PipelineError::Fetch(_) => "FetchError",
            PipelineError::StorageWrite(_) => "StorageWriteError",
            PipelineError::StorageRead(_) => "StorageReadError",
            PipelineError::AuthExpired(_) => "AuthExpired",
            PipelineError::Publish { .. } => "PublishError",
            PipelineError::TimedOut { .. } => "Timeout",
            PipelineError::CredentialStore(_) => "CredentialStore",
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidUrl(reason) => PipelineError::Validation(reason),
            FetchError::LengthUnknown { .. } => PipelineError::LengthUnknown(err.to_string()),
            other => PipelineError::Fetch(other.to_string()),
        }
    }
}

impl From<StagerError> for PipelineError {
    fn from(err: StagerError) -> Self {
        if err.is_write() {
            PipelineError::StorageWrite(err.to_string())
        } else {
            PipelineError::StorageRead(err.to_string())
        }
    }
}

impl From<PublishError> for PipelineError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::AuthExpired(reason) => PipelineError::AuthExpired(reason),
            PublishError::Upstream {
                message, payload, ..
            } => PipelineError::Publish {
                message,
                details: payload,
            },
            PublishError::Artifact(reason) => PipelineError::StorageRead(reason),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Unauthenticated => AppError::Unauthenticated(err.to_string()),
            PipelineError::NotFound { .. } => AppError::CredentialNotFound(err.to_string()),
            PipelineError::Validation(msg) => AppError::InvalidInput(msg),
            PipelineError::LengthUnknown(msg) => AppError::LengthUnknown(msg),
            PipelineError::Fetch(msg) => AppError::Fetch(msg),
            PipelineError::StorageWrite(msg) => AppError::StorageWrite(msg),
            PipelineError::StorageRead(msg) => AppError::StorageRead(msg),
            PipelineError::AuthExpired(msg) => AppError::AuthExpired(msg),
            PipelineError::Publish { message, details } => AppError::Publish { message, details },
            PipelineError::TimedOut { .. } => AppError::Timeout(err.to_string()),
            PipelineError::CredentialStore(inner) => inner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaycast_core::ErrorMetadata;

    #[test]
    fn test_fetch_errors_are_classified() {
        let err: PipelineError = FetchError::LengthUnknown {
            url: "https://example.com/a.mp4".to_string(),
        }
        .into();
        assert_eq!(err.kind(), "LengthUnknown");

        let err: PipelineError = FetchError::InvalidUrl("private address".to_string()).into();
        assert_eq!(err.kind(), "Validation");

        let err: PipelineError = FetchError::Status {
            status: 404,
            body: String::new(),
        }
        .into();
        assert_eq!(err.kind(), "FetchError");
    }

    #[test]
    fn test_publish_payload_survives_conversion() {
        let payload = serde_json::json!({"error": {"code": 403}});
        let err: PipelineError = PublishError::Upstream {
            status: Some(403),
            message: "quota".to_string(),
            payload: Some(payload.clone()),
        }
        .into();

        let app: AppError = err.into();
        assert_eq!(app.upstream_details(), Some(&payload));
        assert_eq!(app.http_status_code(), 500);
    }

    #[test]
    fn test_http_status_mapping() {
        let status = |err: PipelineError| AppError::from(err).http_status_code();

        assert_eq!(status(PipelineError::Unauthenticated), 401);
        assert_eq!(
            status(PipelineError::NotFound {
                subject_id: "s".to_string()
            }),
            401
        );
        assert_eq!(status(PipelineError::Validation("x".to_string())), 400);
        assert_eq!(status(PipelineError::LengthUnknown("x".to_string())), 500);
        assert_eq!(status(PipelineError::AuthExpired("x".to_string())), 401);
        assert_eq!(status(PipelineError::TimedOut { after_secs: 1 }), 504);
    }
}
