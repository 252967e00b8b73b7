//! Administrative account listing.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use super::auth::AuthState;
use super::auth::session::{authenticate, authorize};
use super::auth::types::{AccountData, UsersBody, UsersEnvelope};
use crate::api::error::ErrorBody;
use crate::store::Role;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// List active accounts. Requires an admin session.
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(ListQuery),
    responses(
        (status = 200, description = "Active accounts", body = UsersEnvelope),
        (status = 401, description = "Not authenticated", body = ErrorBody),
        (status = 403, description = "Not an admin", body = ErrorBody)
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let account = match authenticate(&auth_state, &headers).await {
        Ok(account) => account,
        Err(err) => return err.into_response(),
    };
    if let Err(err) = authorize(&account, &[Role::Admin]) {
        return err.into_response();
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    match auth_state.service().list_accounts(limit, offset).await {
        Ok((accounts, total)) => {
            let users: Vec<AccountData> = accounts.iter().map(AccountData::from).collect();
            let envelope = UsersEnvelope {
                status: "success",
                results: users.len(),
                total_users: total,
                data: UsersBody { users },
            };
            (StatusCode::OK, Json(envelope)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
