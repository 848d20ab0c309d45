//! Consent flow with the authorization provider.
//!
//! `/auth/login` sends the user to the provider; `/auth/callback` receives the
//! authorization code, stores the resulting credential and reports the
//! subject id the caller should pass as `userId` on uploads.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use relaycast_core::models::{AuthCallbackResponse, CredentialUpsert};
use relaycast_core::AppError;
use relaycast_infra::ErrorResponse;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthCallbackQuery {
    /// Authorization code issued by the provider
    pub code: Option<String>,
    /// Value issued by `/auth/login`
    pub state: Option<String>,
    /// Set by the provider when the user declined consent
    pub error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/login",
    tag = "auth",
    responses(
        (status = 307, description = "Redirect to the provider consent screen"),
        (status = 500, description = "Consent URL could not be built", body = ErrorResponse)
    )
)]
pub async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect, HttpAppError> {
    let oauth_state = state.oauth_states.issue().await;
    let url = state.oauth.authorization_url(&oauth_state)?;

    tracing::debug!("Redirecting to authorization provider");
    Ok(Redirect::temporary(url.as_str()))
}

#[utoipa::path(
    get,
    path = "/auth/callback",
    tag = "auth",
    params(AuthCallbackQuery),
    responses(
        (status = 200, description = "Credential stored", body = AuthCallbackResponse),
        (status = 400, description = "Missing code, unknown state, or consent declined", body = ErrorResponse),
        (status = 502, description = "Provider call failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, query), fields(operation = "oauth_callback"))]
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthCallbackQuery>,
) -> Result<Json<AuthCallbackResponse>, HttpAppError> {
    if let Some(error) = query.error {
        return Err(AppError::BadRequest(format!("Authorization was not granted: {}", error)).into());
    }

    let oauth_state = query
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state parameter".to_string()))?;
    if !state.oauth_states.redeem(&oauth_state).await {
        return Err(
            AppError::BadRequest("Unknown or expired state parameter".to_string()).into(),
        );
    }

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing code parameter".to_string()))?;

    let grant = state.oauth.exchange_code(&code).await?;
    let user = state.oauth.user_info(&grant.access_token).await?;

    if grant.refresh_token.is_none() {
        tracing::warn!(
            subject_id = %user.sub,
            "Provider returned no refresh token; keeping any stored one"
        );
    }

    let record = state
        .credentials
        .upsert(CredentialUpsert {
            subject_id: user.sub,
            email: user.email,
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: grant.expires_at,
        })
        .await?;

    tracing::info!(
        subject_id = %record.subject_id,
        email = ?record.email,
        "Credential stored"
    );

    Ok(Json(AuthCallbackResponse {
        message: "Authorization successful".to_string(),
        user_id: record.subject_id,
    }))
}
