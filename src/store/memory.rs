//! In-memory account store.
//!
//! Backs the test suite and local development. Implements the same
//! uniqueness and versioning guarantees as the Postgres store, so the
//! auth flows exercise identical failure paths against either backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Account, AccountFilter, AccountStore, NewAccount, Role, StoreError};

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn insert(&self, new_account: NewAccount) -> Result<Account, StoreError> {
        let mut accounts = self.accounts.lock().await;
        // Uniqueness spans soft-deleted accounts too, matching the
        // database unique index.
        if accounts
            .values()
            .any(|account| account.email == new_account.email)
        {
            return Err(StoreError::DuplicateEmail);
        }

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
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_one(&self, filter: AccountFilter) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .find(|account| filter.matches(account))
            .cloned())
    }

    async fn save(&self, account: &mut Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().await;
        let stored = accounts.get_mut(&account.id).ok_or(StoreError::Missing)?;
        if stored.version != account.version {
            return Err(StoreError::VersionConflict);
        }
        account.version += 1;
        *stored = account.clone();
        Ok(())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.values().filter(|account| account.is_active).count() as u64)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Account>, StoreError> {
        let accounts = self.accounts.lock().await;
        let mut active: Vec<Account> = accounts
            .values()
            .filter(|account| account.is_active)
            .cloned()
            .collect();
        active.sort_by_key(|account| account.created_at);
        Ok(active
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(0))
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }
}
