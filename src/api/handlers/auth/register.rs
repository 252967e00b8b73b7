//! Registration endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::rate_limit::RateLimitAction;
use super::state::AuthState;
use super::types::{AccountEnvelope, RegisterRequest};
use super::admit;
use crate::api::error::{ApiError, ErrorBody};

/// Create an unverified account and send the verification link.
///
/// No session is opened here; the first token is minted by
/// verify-email.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification link sent", body = AccountEnvelope),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email already in use", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody),
        (status = 500, description = "Verification email could not be sent", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::InvalidRequest("Missing payload.".to_string()).into_response();
    };

    if let Err(err) = admit(
        &auth_state,
        &headers,
        RateLimitAction::Register,
        Some(&request.email),
    ) {
        return err.into_response();
    }

    match auth_state
        .service()
        .register(
            &request.first_name,
            request.second_name.as_deref(),
            &request.email,
            &request.password,
            &request.password_confirm,
        )
        .await
    {
        Ok((account, message)) => (
            StatusCode::CREATED,
            Json(AccountEnvelope::new(&account).with_message(message)),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
