//! Account record and row mapping.

use chrono::{DateTime, Utc};
use roster_types::{AccountId, AccountView};
use rusqlite::types::Type;
use rusqlite::Row;
use std::fmt;

/// Column list shared by every query that returns a full account row.
pub(crate) const ACCOUNT_COLUMNS: &str = "id, created_at, updated_at, email, username, \
     password_hash, is_premium, verification_code, is_verified";

/// A stored account, including its secrets.
///
/// Only [`Account::view`] leaves the service; the password hash and the
/// verification code stay server-side.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub is_premium: bool,
    /// Zero means no reset flow is pending.
    pub verification_code: i32,
    pub is_verified: bool,
}

impl Account {
    /// Projects the account onto its public view.
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            email: self.email.clone(),
            username: self.username.clone(),
            is_premium: self.is_premium,
            is_verified: self.is_verified,
            verification_pending: self.verification_code != 0,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("is_premium", &self.is_premium)
            .field("verification_code", &"[REDACTED]")
            .field("is_verified", &self.is_verified)
            .finish()
    }
}

/// Parameters for inserting a new account.
#[derive(Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub is_premium: bool,
}

impl fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewAccount")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("is_premium", &self.is_premium)
            .finish()
    }
}

pub(crate) fn map_row_to_account(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: account_id_at(row, 0)?,
        created_at: timestamp_at(row, 1)?,
        updated_at: timestamp_at(row, 2)?,
        email: row.get(3)?,
        username: row.get(4)?,
        password_hash: row.get(5)?,
        is_premium: row.get(6)?,
        verification_code: row.get(7)?,
        is_verified: row.get(8)?,
    })
}

pub(crate) fn account_id_at(row: &Row, idx: usize) -> rusqlite::Result<AccountId> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, micros))
}

/// Current time as unix microseconds, the storage format for timestamps.
pub(crate) fn now_micros() -> i64 {
    Utc::now().timestamp_micros()
}
