//! Request and response types for the auth endpoints.
//!
//! Field names follow the platform's camelCase wire convention.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::store::Account;

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    #[serde(default)]
    pub second_name: Option<String>,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Shared by resend-verification and forgot-password.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
    pub password_confirm: String,
}

/// Public projection of an account. Password material and pending
/// secrets never appear here.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountData {
    pub id: Uuid,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_name: Option<String>,
    pub email: String,
    pub role: String,
    pub is_verified: bool,
}

impl From<&Account> for AccountData {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            first_name: account.first_name.clone(),
            second_name: account.second_name.clone(),
            email: account.email.clone(),
            role: account.role.as_str().to_string(),
            is_verified: account.is_verified,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct AccountBody {
    pub user: AccountData,
}

/// Success envelope carrying an account, and a session token when the
/// operation establishes one.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct AccountEnvelope {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub data: AccountBody,
}

impl AccountEnvelope {
    #[must_use]
    pub fn new(account: &Account) -> Self {
        Self {
            status: "success",
            message: None,
            token: None,
            data: AccountBody {
                user: AccountData::from(account),
            },
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

/// Success envelope with no account payload, used by the uniform
/// anti-enumeration responses.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct MessageEnvelope {
    pub status: &'static str,
    pub message: String,
}

impl MessageEnvelope {
    #[must_use]
    pub fn new(message: &str) -> Self {
        Self {
            status: "success",
            message: message.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct UsersBody {
    pub users: Vec<AccountData>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsersEnvelope {
    pub status: &'static str,
    pub results: usize,
    pub total_users: u64,
    pub data: UsersBody,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;
    use chrono::Utc;

    #[test]
    fn account_data_hides_secrets() {
        let account = Account {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            first_name: "Alice".to_string(),
            second_name: None,
            password_hash: "$argon2id$stub".to_string(),
            password_changed_at: None,
            email_verification: None,
            password_reset: None,
            is_verified: true,
            is_active: true,
            role: Role::User,
            saved_books: Vec::new(),
            created_at: Utc::now(),
            version: 1,
        };
        let envelope = AccountEnvelope::new(&account).with_token("jwt".to_string());
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"firstName\":\"Alice\""));
        assert!(json.contains("\"token\":\"jwt\""));
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("message"));
    }
}
