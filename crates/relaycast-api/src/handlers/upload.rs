//! `POST /upload`: publish a remotely hosted video for an authorized user.

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use relaycast_core::models::{PublishQuery, PublishRequest, PublishResponse};
use relaycast_core::AppError;
use relaycast_infra::ErrorResponse;
use relaycast_pipeline::PipelineError;
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/upload",
    tag = "publish",
    params(PublishQuery),
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Video published", body = PublishResponse),
        (status = 400, description = "Missing or invalid request field", body = ErrorResponse),
        (status = 401, description = "No userId, no stored credential, or authorization expired", body = ErrorResponse),
        (status = 500, description = "Fetch, staging or publish failure; details carry the upstream payload", body = ErrorResponse),
        (status = 504, description = "Run exceeded its time limit", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, body),
    fields(subject_id = ?query.user_id, operation = "publish_video")
)]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublishQuery>,
    body: Result<ValidatedJson<PublishRequest>, HttpAppError>,
) -> Result<Json<PublishResponse>, HttpAppError> {
    // A missing subject outranks a bad body.
    if !query
        .user_id
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty())
    {
        return Err(PipelineError::Unauthenticated.into());
    }
    let ValidatedJson(request) = body?;

    // The run lives on its own task: if this request is dropped the run
    // still reaches cleanup.
    let report = state
        .pipeline
        .spawn_run(query.user_id, request)
        .await
        .map_err(|e| AppError::Internal(format!("Publish run aborted: {}", e)))?;

    if !report.cleanup_failures.is_empty() {
        tracing::warn!(
            run_id = %report.run_id,
            failures = ?report.cleanup_failures,
            "Run finished with unreleased resources"
        );
    }

    let video = report.result?;

    Ok(Json(PublishResponse {
        video_id: video.video_id,
        message: "Video uploaded successfully".to_string(),
        url: video.url,
    }))
}
