//! API error taxonomy and its wire rendering.
//!
//! Every handler failure funnels through [`ApiError`], which renders the
//! uniform `{status, message}` envelope: `status` is `"fail"` for client
//! errors and `"error"` for server errors. Messages for credential and
//! recovery failures are deliberately uniform so responses do not reveal
//! whether an email is registered.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use super::response::debug_errors;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Email is already in use.")]
    Conflict,
    /// Validation failures and invalid or expired one-time secrets. The
    /// message is operation specific but never account specific.
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Incorrect email or password.")]
    InvalidCredentials,
    #[error("Please verify your email before logging in.")]
    NotVerified,
    #[error("You are not logged in. Please log in to get access.")]
    Unauthenticated,
    #[error("User recently changed password. Please log in again.")]
    SessionRevoked,
    #[error("Invalid or expired session. Please log in again.")]
    TokenInvalid,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("Not found.")]
    NotFound,
    #[error("Too many requests. Please try again later.")]
    RateLimited { retry_after_seconds: u64 },
    #[error("We could not send the email. Please try again later.")]
    DeliveryFailed,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidRequest(_) | Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::NotVerified
            | Self::Unauthenticated
            | Self::SessionRevoked
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DeliveryFailed | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::Conflict,
            // The loser of a concurrent update gets the same answer an
            // invalid secret would: try the operation again.
            StoreError::VersionConflict => {
                Self::InvalidRequest("The request could not be completed. Please try again.".to_string())
            }
            StoreError::Missing => Self::NotFound,
            StoreError::Backend(err) => Self::Internal(err),
        }
    }
}

/// `{status, message}` body shared by every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// `"fail"` for 4xx, `"error"` for 5xx.
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let label = if status.is_server_error() {
            "error"
        } else {
            "fail"
        };

        let message = match &self {
            Self::Internal(err) => {
                error!("internal error: {err:?}");
                if debug_errors() {
                    format!("{err:#}")
                } else {
                    "Something went wrong. Please try again later.".to_string()
                }
            }
            other => other.to_string(),
        };

        let mut headers = HeaderMap::new();
        if let Self::RateLimited {
            retry_after_seconds,
        } = &self
        {
            if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                headers.insert(RETRY_AFTER, value);
            }
        }

        let body = ErrorBody {
            status: label,
            message,
        };
        (status, headers, Json(body)).into_response()
    }
}
