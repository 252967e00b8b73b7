//! Password recovery endpoints: forgot, OTP check, reset.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::rate_limit::RateLimitAction;
use super::service::MSG_OTP_SENT;
use super::state::AuthState;
use super::types::{
    AccountEnvelope, EmailRequest, MessageEnvelope, ResetPasswordRequest, VerifyOtpRequest,
};
use super::{admit, session_response};
use crate::api::error::{ApiError, ErrorBody};

/// Send a recovery OTP. Emails without a verified account are rejected
/// with a message that does not say why.
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Recovery code sent", body = MessageEnvelope),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody),
        (status = 500, description = "Recovery email could not be sent", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn forgot_password(
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
        RateLimitAction::ForgotPassword,
        Some(&request.email),
    ) {
        return err.into_response();
    }

    match auth_state.service().forgot_password(&request.email).await {
        Ok(()) => (StatusCode::OK, Json(MessageEnvelope::new(MSG_OTP_SENT))).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Check an OTP without consuming it.
#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-reset-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP is valid", body = MessageEnvelope),
        (status = 400, description = "Invalid or expired OTP", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_reset_otp(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::InvalidRequest("Missing payload.".to_string()).into_response();
    };

    if let Err(err) = admit(
        &auth_state,
        &headers,
        RateLimitAction::VerifyOtp,
        Some(&request.email),
    ) {
        return err.into_response();
    }

    match auth_state
        .service()
        .verify_otp(&request.email, &request.otp)
        .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(MessageEnvelope::new("OTP verified successfully.")),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

/// Consume the OTP, set the new password, and open a session.
#[utoipa::path(
    patch,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated, session opened", body = AccountEnvelope),
        (status = 400, description = "Invalid input or OTP", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::InvalidRequest("Missing payload.".to_string()).into_response();
    };

    if let Err(err) = admit(
        &auth_state,
        &headers,
        RateLimitAction::ResetPassword,
        Some(&request.email),
    ) {
        return err.into_response();
    }

    match auth_state
        .service()
        .reset_password(
            &request.email,
            &request.otp,
            &request.password,
            &request.password_confirm,
        )
        .await
    {
        Ok((account, session)) => session_response(
            &auth_state,
            StatusCode::OK,
            &account,
            session.token,
            "Password updated successfully.",
        ),
        Err(err) => err.into_response(),
    }
}
