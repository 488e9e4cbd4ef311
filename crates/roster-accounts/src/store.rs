//! The account store capability and its pooled SQLite implementation.

use roster_db::DbPool;
use roster_types::AccountId;
use std::num::NonZeroI32;

use crate::account::{Account, NewAccount};
use crate::error::StoreError;
use crate::queries;

/// Keyed persistence for accounts.
///
/// Calls are blocking; async callers run them on the blocking pool. Each
/// call is atomic on its own, but two calls are not atomic together.
pub trait AccountStore: Send + Sync {
    fn insert(&self, new: &NewAccount) -> Result<Account, StoreError>;
    fn fetch_by_id(&self, id: AccountId) -> Result<Account, StoreError>;
    fn fetch_by_email_or_username(&self, identifier: &str) -> Result<Account, StoreError>;
    fn fetch_all(&self) -> Result<Vec<Account>, StoreError>;
    fn update_username(&self, id: AccountId, username: &str) -> Result<Account, StoreError>;
    fn update_password(&self, id: AccountId, password_hash: &str) -> Result<(), StoreError>;
    fn set_verification_code(&self, id: AccountId, code: NonZeroI32) -> Result<(), StoreError>;
    /// Clears the code only if it still equals `expected`; see
    /// [`crate::consume_verification_code`].
    fn consume_verification_code(
        &self,
        id: AccountId,
        expected: NonZeroI32,
    ) -> Result<bool, StoreError>;
    fn add_subscriber(&self, account: AccountId, subscriber: AccountId)
        -> Result<bool, StoreError>;
    fn remove_subscriber(
        &self,
        account: AccountId,
        subscriber: AccountId,
    ) -> Result<bool, StoreError>;
    fn list_subscribers(&self, account: AccountId) -> Result<Vec<AccountId>, StoreError>;
    fn delete(&self, id: AccountId) -> Result<(), StoreError>;
    fn delete_all(&self) -> Result<usize, StoreError>;
}

/// [`AccountStore`] backed by the shared SQLite pool.
///
/// Each call borrows one pooled connection for its duration.
#[derive(Clone)]
pub struct SqliteAccountStore {
    pool: DbPool,
}

impl SqliteAccountStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl AccountStore for SqliteAccountStore {
    fn insert(&self, new: &NewAccount) -> Result<Account, StoreError> {
        let conn = self.pool.get()?;
        queries::insert_account(&conn, new)
    }

    fn fetch_by_id(&self, id: AccountId) -> Result<Account, StoreError> {
        let conn = self.pool.get()?;
        queries::get_account(&conn, id)
    }

    fn fetch_by_email_or_username(&self, identifier: &str) -> Result<Account, StoreError> {
        let conn = self.pool.get()?;
        queries::find_by_email_or_username(&conn, identifier)
    }

    fn fetch_all(&self) -> Result<Vec<Account>, StoreError> {
        let conn = self.pool.get()?;
        queries::list_accounts(&conn)
    }

    fn update_username(&self, id: AccountId, username: &str) -> Result<Account, StoreError> {
        let conn = self.pool.get()?;
        queries::update_username(&conn, id, username)
    }

    fn update_password(&self, id: AccountId, password_hash: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        queries::update_password(&conn, id, password_hash)
    }

    fn set_verification_code(&self, id: AccountId, code: NonZeroI32) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        queries::set_verification_code(&conn, id, code)
    }

    fn consume_verification_code(
        &self,
        id: AccountId,
        expected: NonZeroI32,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        queries::consume_verification_code(&conn, id, expected)
    }

    fn add_subscriber(
        &self,
        account: AccountId,
        subscriber: AccountId,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        queries::add_subscriber(&conn, account, subscriber)
    }

    fn remove_subscriber(
        &self,
        account: AccountId,
        subscriber: AccountId,
    ) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        queries::remove_subscriber(&conn, account, subscriber)
    }

    fn list_subscribers(&self, account: AccountId) -> Result<Vec<AccountId>, StoreError> {
        let conn = self.pool.get()?;
        queries::list_subscribers(&conn, account)
    }

    fn delete(&self, id: AccountId) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        queries::delete_account(&conn, id)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let conn = self.pool.get()?;
        queries::delete_all_accounts(&conn)
    }
}
