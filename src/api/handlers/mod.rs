//! HTTP handlers.

use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};

use super::error::ErrorBody;

pub(crate) mod auth;
pub(crate) mod health;
pub(crate) mod users;

/// Catch-all for unmatched routes, keeping the error envelope uniform.
pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            status: "fail",
            message: "Can't find the requested resource on this server.".to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn not_found_is_enveloped() {
        let response = not_found().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
