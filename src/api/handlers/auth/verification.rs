//! Email verification endpoints.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::rate_limit::RateLimitAction;
use super::service::MSG_VERIFICATION_SENT;
use super::state::AuthState;
use super::types::{AccountEnvelope, EmailRequest, MessageEnvelope};
use super::{admit, session_response};
use crate::api::error::{ApiError, ErrorBody};

/// Consume a verification link and open the account's first session.
#[utoipa::path(
    get,
    path = "/api/v1/auth/verify-email/{token}",
    params(
        ("token" = String, Path, description = "Raw verification token from the emailed link")
    ),
    responses(
        (status = 200, description = "Email confirmed, session opened", body = AccountEnvelope),
        (status = 400, description = "Invalid or expired link", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Path(token): Path<String>,
) -> Response {
    // IP-keyed only; the account is not named until the token resolves.
    if let Err(err) = admit(&auth_state, &headers, RateLimitAction::VerifyEmail, None) {
        return err.into_response();
    }

    let token = token.trim();
    if token.is_empty() {
        return ApiError::InvalidRequest("Missing token.".to_string()).into_response();
    }

    match auth_state.service().verify_email(token).await {
        Ok((account, session)) => session_response(
            &auth_state,
            StatusCode::OK,
            &account,
            session.token,
            "Email confirmed successfully.",
        ),
        Err(err) => err.into_response(),
    }
}

/// Resend the verification link. Emails without a pending account are
/// rejected with a message that does not say why.
#[utoipa::path(
    post,
    path = "/api/v1/auth/resend-verification",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Verification link sent", body = MessageEnvelope),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody),
        (status = 500, description = "Verification email could not be sent", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn resend_verification(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<EmailRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::InvalidRequest("Missing payload.".to_string()).into_response();
    };

    if let Err(err) = admit(
        &auth_state,
        &headers,
        RateLimitAction::ResendVerification,
        Some(&request.email),
    ) {
        return err.into_response();
    }

    match auth_state.service().resend_verification(&request.email).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageEnvelope::new(MSG_VERIFICATION_SENT)),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
