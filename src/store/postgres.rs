//! Postgres-backed account store.
//!
//! Queries run under `db.query` spans so request traces show the
//! statements they executed. Email uniqueness rides on the unique index
//! (SQLSTATE 23505 is translated to [`StoreError::DuplicateEmail`]) and
//! saves are guarded by `WHERE version = $n`.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, postgres::PgRow, types::Json};
use std::str::FromStr;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{
    Account, AccountFilter, AccountStore, NewAccount, PendingSecret, Role, SavedBook, StoreError,
};

const ACCOUNT_COLUMNS: &str = "id, email, first_name, second_name, password_hash, \
     password_changed_at, verification_digest, verification_expires_at, \
     reset_digest, reset_expires_at, is_verified, is_active, role, \
     saved_books, created_at, version";

#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert(&self, new_account: NewAccount) -> Result<Account, StoreError> {
        let account = Account {
            id: Uuid::new_v4(),
            email: new_account.email,
            first_name: new_account.first_name,
            second_name: new_account.second_name,
            password_hash: new_account.password_hash,
            password_changed_at: None,
            email_verification: new_account.email_verification,
            password_reset: None,
            is_verified: false,
            is_active: true,
            role: Role::User,
            saved_books: Vec::new(),
            created_at: Utc::now(),
            version: 1,
        };

        let query = r"
            INSERT INTO accounts
                (id, email, first_name, second_name, password_hash,
                 verification_digest, verification_expires_at,
                 is_verified, is_active, role, saved_books, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account.id)
            .bind(&account.email)
            .bind(&account.first_name)
            .bind(&account.second_name)
            .bind(&account.password_hash)
            .bind(
                account
                    .email_verification
                    .as_ref()
                    .map(|secret| secret.digest.clone()),
            )
            .bind(
                account
                    .email_verification
                    .as_ref()
                    .map(|secret| secret.expires_at),
            )
            .bind(account.is_verified)
            .bind(account.is_active)
            .bind(account.role.as_str())
            .bind(Json(&account.saved_books))
            .bind(account.created_at)
            .bind(account.version)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(_) => Ok(account),
            Err(err) if is_unique_violation(&err) => Err(StoreError::DuplicateEmail),
            Err(err) => Err(StoreError::Backend(
                anyhow::Error::new(err).context("failed to insert account"),
            )),
        }
    }

    async fn find_one(&self, filter: AccountFilter) -> Result<Option<Account>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE TRUE"
        ));
        if !filter.include_inactive {
            builder.push(" AND is_active");
        }
        if let Some(id) = filter.id {
            builder.push(" AND id = ").push_bind(id);
        }
        if let Some(email) = &filter.email {
            builder.push(" AND email = ").push_bind(email.clone());
        }
        if let Some(is_verified) = filter.is_verified {
            builder.push(" AND is_verified = ").push_bind(is_verified);
        }
        if let Some(digest) = &filter.verification_digest {
            builder
                .push(" AND verification_digest = ")
                .push_bind(digest.clone());
            if let Some(at) = filter.secrets_valid_at {
                builder.push(" AND verification_expires_at > ").push_bind(at);
            }
        }
        if let Some(digest) = &filter.reset_digest {
            builder.push(" AND reset_digest = ").push_bind(digest.clone());
            if let Some(at) = filter.secrets_valid_at {
                builder.push(" AND reset_expires_at > ").push_bind(at);
            }
        }
        builder.push(" LIMIT 1");

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = "SELECT .. FROM accounts"
        );
        let row = builder
            .build()
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up account")?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn save(&self, account: &mut Account) -> Result<(), StoreError> {
        let query = r"
            UPDATE accounts
            SET email = $2,
                first_name = $3,
                second_name = $4,
                password_hash = $5,
                password_changed_at = $6,
                verification_digest = $7,
                verification_expires_at = $8,
                reset_digest = $9,
                reset_expires_at = $10,
                is_verified = $11,
                is_active = $12,
                role = $13,
                saved_books = $14,
                updated_at = NOW(),
                version = version + 1
            WHERE id = $1
              AND version = $15
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(account.id)
            .bind(&account.email)
            .bind(&account.first_name)
            .bind(&account.second_name)
            .bind(&account.password_hash)
            .bind(account.password_changed_at)
            .bind(
                account
                    .email_verification
                    .as_ref()
                    .map(|secret| secret.digest.clone()),
            )
            .bind(
                account
                    .email_verification
                    .as_ref()
                    .map(|secret| secret.expires_at),
            )
            .bind(
                account
                    .password_reset
                    .as_ref()
                    .map(|secret| secret.digest.clone()),
            )
            .bind(
                account
                    .password_reset
                    .as_ref()
                    .map(|secret| secret.expires_at),
            )
            .bind(account.is_verified)
            .bind(account.is_active)
            .bind(account.role.as_str())
            .bind(Json(&account.saved_books))
            .bind(account.version)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to save account")?;

        if result.rows_affected() == 0 {
            return Err(self.stale_save_error(account.id).await);
        }
        account.version += 1;
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let query = "SELECT COUNT(*) AS total FROM accounts WHERE is_active";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to count accounts")?;
        let total: i64 = row.try_get("total").context("invalid count row")?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE is_active \
             ORDER BY created_at ASC LIMIT $1 OFFSET $2"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = "SELECT .. FROM accounts ORDER BY created_at"
        );
        let rows = sqlx::query(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list accounts")?;

        rows.iter().map(row_to_account).collect()
    }
}

impl PgAccountStore {
    /// A zero-row update either raced another writer or targets a
    /// deleted account; distinguish the two for the caller.
    async fn stale_save_error(&self, id: Uuid) -> StoreError {
        let query = "SELECT 1 FROM accounts WHERE id = $1";
        let exists = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        match exists {
            Ok(Some(_)) => StoreError::VersionConflict,
            Ok(None) => StoreError::Missing,
            Err(err) => StoreError::Backend(
                anyhow::Error::new(err).context("failed to inspect stale save"),
            ),
        }
    }
}

fn row_to_account(row: &PgRow) -> Result<Account, StoreError> {
    let role: String = row.try_get("role").context("invalid role column")?;
    let saved_books: Json<Vec<SavedBook>> = row
        .try_get("saved_books")
        .context("invalid saved_books column")?;

    Ok(Account {
        id: row.try_get("id").context("invalid id column")?,
        email: row.try_get("email").context("invalid email column")?,
        first_name: row
            .try_get("first_name")
            .context("invalid first_name column")?,
        second_name: row
            .try_get("second_name")
            .context("invalid second_name column")?,
        password_hash: row
            .try_get("password_hash")
            .context("invalid password_hash column")?,
        password_changed_at: row
            .try_get("password_changed_at")
            .context("invalid password_changed_at column")?,
        email_verification: pending_secret(
            row.try_get("verification_digest")
                .context("invalid verification_digest column")?,
            row.try_get("verification_expires_at")
                .context("invalid verification_expires_at column")?,
        ),
        password_reset: pending_secret(
            row.try_get("reset_digest")
                .context("invalid reset_digest column")?,
            row.try_get("reset_expires_at")
                .context("invalid reset_expires_at column")?,
        ),
        is_verified: row
            .try_get("is_verified")
            .context("invalid is_verified column")?,
        is_active: row
            .try_get("is_active")
            .context("invalid is_active column")?,
        role: Role::from_str(&role)?,
        saved_books: saved_books.0,
        created_at: row
            .try_get("created_at")
            .context("invalid created_at column")?,
        version: row.try_get("version").context("invalid version column")?,
    })
}

fn pending_secret(
    digest: Option<Vec<u8>>,
    expires_at: Option<chrono::DateTime<Utc>>,
) -> Option<PendingSecret> {
    match (digest, expires_at) {
        (Some(digest), Some(expires_at)) => Some(PendingSecret { digest, expires_at }),
        _ => None,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
