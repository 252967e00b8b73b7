//! Session cookie construction and request authentication.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue},
};

use super::state::AuthState;
use crate::api::error::ApiError;
use crate::store::{Account, Role};

const SESSION_COOKIE_NAME: &str = "bookshelf_session";

/// Build the `HttpOnly` session cookie for a freshly issued token.
pub(super) fn session_cookie(
    state: &AuthState,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = state.config().session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={ttl_seconds}"
    );
    if state.config().session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Resolve the request's session into an account.
///
/// Bearer tokens take precedence over the cookie. A missing token is
/// [`ApiError::Unauthenticated`]; everything downstream (bad signature,
/// expiry, revocation, deactivated account) surfaces through the
/// service.
pub(crate) async fn authenticate(
    state: &AuthState,
    headers: &HeaderMap,
) -> Result<Account, ApiError> {
    let token = extract_session_token(headers).ok_or(ApiError::Unauthenticated)?;
    state.service().authenticate(&token).await
}

pub(crate) fn authorize(account: &Account, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&account.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            COOKIE,
            HeaderValue::from_static("bookshelf_session=from-cookie"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_token_is_found_among_pairs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; bookshelf_session=tok; lang=en"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("tok"));
    }

    #[test]
    fn empty_bearer_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn missing_token_is_none() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn admin_gate_rejects_users() {
        let account = crate::store::Account {
            id: uuid::Uuid::new_v4(),
            email: "a@example.com".to_string(),
            first_name: "A".to_string(),
            second_name: None,
            password_hash: String::new(),
            password_changed_at: None,
            email_verification: None,
            password_reset: None,
            is_verified: true,
            is_active: true,
            role: Role::User,
            saved_books: Vec::new(),
            created_at: chrono::Utc::now(),
            version: 1,
        };
        assert!(matches!(
            authorize(&account, &[Role::Admin]),
            Err(ApiError::Forbidden)
        ));
        assert!(authorize(&account, &[Role::Admin, Role::User]).is_ok());
    }
}
