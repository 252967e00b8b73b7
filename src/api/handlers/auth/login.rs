//! Login endpoint.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::rate_limit::RateLimitAction;
use super::state::AuthState;
use super::types::{AccountEnvelope, LoginRequest};
use super::{admit, session_response};
use crate::api::error::{ApiError, ErrorBody};

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = AccountEnvelope),
        (status = 400, description = "Incorrect email or password", body = ErrorBody),
        (status = 401, description = "Email not verified", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::InvalidRequest("Missing payload.".to_string()).into_response();
    };

    if let Err(err) = admit(
        &auth_state,
        &headers,
        RateLimitAction::Login,
        Some(&request.email),
    ) {
        return err.into_response();
    }

    match auth_state
        .service()
        .login(&request.email, &request.password)
        .await
    {
        Ok((account, session)) => session_response(
            &auth_state,
            StatusCode::OK,
            &account,
            session.token,
            "Logged in successfully.",
        ),
        Err(err) => err.into_response(),
    }
}
