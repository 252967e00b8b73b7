//! Account persistence: the model, the lookup filter, and the store contract.
//!
//! The store owns two hard guarantees the auth flows rely on:
//!
//! - email uniqueness is enforced at insert time, so duplicate
//!   registrations collapse to [`StoreError::DuplicateEmail`] even when
//!   two requests race;
//! - every [`AccountStore::save`] is guarded by an optimistic `version`
//!   check, so two read-modify-write sequences on the same account
//!   cannot silently overwrite each other's secret fields.
//!
//! Inactive (soft-deleted) accounts are excluded from every lookup unless
//! the filter explicitly opts in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryAccountStore;
pub use postgres::PgAccountStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(anyhow::anyhow!("unknown role: {other}")),
        }
    }
}

/// An outstanding one-time secret: only the digest is at rest, never the
/// raw value. A new secret for the same purpose overwrites the previous
/// one, which invalidates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSecret {
    pub digest: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedBook {
    pub book_id: Uuid,
    pub saved_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    /// Normalized (trimmed, lowercased) and unique across active and
    /// inactive accounts.
    pub email: String,
    pub first_name: String,
    pub second_name: Option<String>,
    /// Argon2 PHC string. Never serialized outward; response DTOs copy
    /// the public fields only.
    pub password_hash: String,
    /// Set on every password change after creation; session tokens
    /// issued before this instant are rejected.
    pub password_changed_at: Option<DateTime<Utc>>,
    pub email_verification: Option<PendingSecret>,
    pub password_reset: Option<PendingSecret>,
    pub is_verified: bool,
    pub is_active: bool,
    pub role: Role,
    pub saved_books: Vec<SavedBook>,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by every successful save.
    pub version: i64,
}

#[derive(Clone, Debug)]
pub struct NewAccount {
    pub email: String,
    pub first_name: String,
    pub second_name: Option<String>,
    pub password_hash: String,
    pub email_verification: Option<PendingSecret>,
}

/// Conjunctive lookup filter, the store-agnostic equivalent of a
/// `findOne` query. Secret-digest conditions can additionally require the
/// secret to be unexpired at a given instant.
#[derive(Clone, Debug, Default)]
pub struct AccountFilter {
    id: Option<Uuid>,
    email: Option<String>,
    is_verified: Option<bool>,
    verification_digest: Option<Vec<u8>>,
    reset_digest: Option<Vec<u8>>,
    secrets_valid_at: Option<DateTime<Utc>>,
    include_inactive: bool,
}

impl AccountFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Expects an already normalized email.
    #[must_use]
    pub fn by_email(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn verified(mut self, is_verified: bool) -> Self {
        self.is_verified = Some(is_verified);
        self
    }

    #[must_use]
    pub fn with_verification_digest(mut self, digest: Vec<u8>) -> Self {
        self.verification_digest = Some(digest);
        self
    }

    #[must_use]
    pub fn with_reset_digest(mut self, digest: Vec<u8>) -> Self {
        self.reset_digest = Some(digest);
        self
    }

    /// Require any digest condition to also be unexpired at `at`.
    #[must_use]
    pub fn secrets_valid_at(mut self, at: DateTime<Utc>) -> Self {
        self.secrets_valid_at = Some(at);
        self
    }

    #[must_use]
    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    /// Evaluate the filter against a single account. The in-memory store
    /// scans with this; the Postgres store compiles the same conditions
    /// to SQL.
    #[must_use]
    pub fn matches(&self, account: &Account) -> bool {
        if !self.include_inactive && !account.is_active {
            return false;
        }
        if self.id.is_some_and(|id| id != account.id) {
            return false;
        }
        if self
            .email
            .as_deref()
            .is_some_and(|email| email != account.email)
        {
            return false;
        }
        if self
            .is_verified
            .is_some_and(|wanted| wanted != account.is_verified)
        {
            return false;
        }
        if let Some(digest) = &self.verification_digest {
            if !secret_matches(account.email_verification.as_ref(), digest, self.secrets_valid_at) {
                return false;
            }
        }
        if let Some(digest) = &self.reset_digest {
            if !secret_matches(account.password_reset.as_ref(), digest, self.secrets_valid_at) {
                return false;
            }
        }
        true
    }
}

fn secret_matches(
    secret: Option<&PendingSecret>,
    digest: &[u8],
    valid_at: Option<DateTime<Utc>>,
) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    if secret.digest != digest {
        return false;
    }
    valid_at.is_none_or(|at| secret.expires_at > at)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    /// The account changed under us; the read-modify-write must be
    /// retried or surfaced as a stale-request failure.
    #[error("account was modified concurrently")]
    VersionConflict,
    #[error("account not found")]
    Missing,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Persist a new account. Fails with [`StoreError::DuplicateEmail`]
    /// when the email is already bound, racing inserts included.
    async fn insert(&self, new_account: NewAccount) -> Result<Account, StoreError>;

    async fn find_one(&self, filter: AccountFilter) -> Result<Option<Account>, StoreError>;

    /// Persist all mutable fields of `account`. Succeeds only when the
    /// stored version still matches `account.version`, then bumps the
    /// version on both sides.
    async fn save(&self, account: &mut Account) -> Result<(), StoreError>;

    /// Number of active accounts.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Active accounts ordered by creation time.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError>;
}
