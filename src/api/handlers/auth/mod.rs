//! Auth handlers and supporting modules.
//!
//! Handlers admit the request through the rate limiter first, then call
//! into [`service::AccountService`] and render the result. All
//! credential and recovery failures surface through
//! [`crate::api::error::ApiError`], which keeps the anti-enumeration
//! messages uniform across endpoints.

use axum::http::{HeaderMap, StatusCode, header::SET_COOKIE};
use axum::{Json, response::IntoResponse, response::Response};

use crate::api::error::ApiError;
use crate::store::Account;

pub(crate) mod login;
pub(crate) mod password;
mod rate_limit;
pub(crate) mod register;
mod secrets;
mod service;
pub(crate) mod session;
mod state;
mod token;
pub(crate) mod types;
pub(crate) mod verification;

pub use rate_limit::{
    Budget, FixedWindowRateLimiter, NoopRateLimiter, RateLimitConfig, RateLimiter,
};
pub use service::AccountService;
pub use state::{AuthConfig, AuthState};

use rate_limit::{RateLimitAction, RateLimitDecision};
use types::AccountEnvelope;

/// Rate-limit gate, run before any store or crypto work.
fn admit(
    state: &AuthState,
    headers: &HeaderMap,
    action: RateLimitAction,
    account: Option<&str>,
) -> Result<(), ApiError> {
    let client_ip = extract_client_ip(headers);
    match state
        .rate_limiter()
        .check(action, client_ip.as_deref(), account)
    {
        RateLimitDecision::Allowed => Ok(()),
        RateLimitDecision::Limited {
            retry_after_seconds,
        } => Err(ApiError::RateLimited {
            retry_after_seconds,
        }),
    }
}

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let trimmed = first.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Render an account plus its fresh session: envelope with the token in
/// the body and the session cookie on the response.
fn session_response(
    state: &AuthState,
    status: StatusCode,
    account: &Account,
    token: String,
    message: &str,
) -> Response {
    let envelope = AccountEnvelope::new(account)
        .with_message(message)
        .with_token(token.clone());
    let mut headers = HeaderMap::new();
    match session::session_cookie(state, &token) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            return ApiError::Internal(anyhow::anyhow!("session cookie build failed: {err}"))
                .into_response();
        }
    }
    (status, headers, Json(envelope)).into_response()
}
