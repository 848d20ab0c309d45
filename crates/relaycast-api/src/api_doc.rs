//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::handlers;
use relaycast_core::models;
use relaycast_infra::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relaycast API",
        version = "0.1.0",
        description = "Publishes remotely hosted videos to a user's video platform account. Authorize once via /auth/login, then POST /upload with the returned userId."
    ),
    paths(
        handlers::upload::upload_video,
        handlers::auth::login,
        handlers::auth::callback,
        handlers::health::liveness_check,
        handlers::health::readiness_check,
    ),
    components(schemas(
        models::PublishRequest,
        models::PublishResponse,
        models::PrivacyStatus,
        models::AuthCallbackResponse,
        ErrorResponse,
    )),
    tags(
        (name = "publish", description = "Transfer and publish"),
        (name = "auth", description = "Consent flow"),
        (name = "health", description = "Probes")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
