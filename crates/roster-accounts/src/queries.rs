//! Parameterised account queries.
//!
//! Each function is one statement or one transaction on the borrowed
//! connection. None of them carries state between calls: a caller that
//! reads and later writes is not protected against a concurrent writer in
//! between, except where a query says otherwise.

use roster_types::AccountId;
use rusqlite::{params, Connection, OptionalExtension};
use std::num::NonZeroI32;

use crate::account::{account_id_at, map_row_to_account, now_micros, Account, NewAccount, ACCOUNT_COLUMNS};
use crate::error::StoreError;

/// SQL fragment advancing `updated_at` strictly: to now, or one microsecond
/// past the previous value if the clock has not moved. Binds `?1` as now.
const TOUCH: &str = "updated_at = MAX(?1, updated_at + 1)";

/// Inserts a new account and returns the stored row.
///
/// The identifier and both timestamps are assigned here.
///
/// # Errors
///
/// Returns `StoreError::Conflict` if the email or username is already in use.
pub fn insert_account(conn: &Connection, new: &NewAccount) -> Result<Account, StoreError> {
    let id = AccountId::new_v4();
    let now = now_micros();
    let account = conn.query_row(
        &format!(
            "INSERT INTO accounts (id, created_at, updated_at, email, username, password_hash, is_premium)
             VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6)
             RETURNING {ACCOUNT_COLUMNS}"
        ),
        params![
            id.to_string(),
            now,
            new.email,
            new.username,
            new.password_hash,
            new.is_premium,
        ],
        map_row_to_account,
    )?;
    tracing::debug!(account_id = %account.id, "account inserted");
    Ok(account)
}

/// Fetches an account by identifier.
pub fn get_account(conn: &Connection, id: AccountId) -> Result<Account, StoreError> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        [id.to_string()],
        map_row_to_account,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

/// Fetches the account whose email or username equals `identifier`.
///
/// If one account's email and another's username both match, the email
/// match wins.
pub fn find_by_email_or_username(
    conn: &Connection,
    identifier: &str,
) -> Result<Account, StoreError> {
    conn.query_row(
        &format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE email = ?1 OR username = ?1
             ORDER BY email = ?1 DESC
             LIMIT 1"
        ),
        [identifier],
        map_row_to_account,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(identifier.to_string()))
}

/// Lists every account, oldest first.
pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at ASC, id ASC"
    ))?;
    let rows = stmt.query_map([], map_row_to_account)?;
    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(row?);
    }
    Ok(accounts)
}

/// Overwrites the username and returns the updated row.
///
/// # Errors
///
/// `StoreError::Conflict` if another account holds the username,
/// `StoreError::NotFound` if the account does not exist.
pub fn update_username(
    conn: &Connection,
    id: AccountId,
    username: &str,
) -> Result<Account, StoreError> {
    conn.query_row(
        &format!(
            "UPDATE accounts SET username = ?2, {TOUCH}
             WHERE id = ?3
             RETURNING {ACCOUNT_COLUMNS}"
        ),
        params![now_micros(), username, id.to_string()],
        map_row_to_account,
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

/// Overwrites the stored password hash.
pub fn update_password(
    conn: &Connection,
    id: AccountId,
    password_hash: &str,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        &format!("UPDATE accounts SET password_hash = ?2, {TOUCH} WHERE id = ?3"),
        params![now_micros(), password_hash, id.to_string()],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Persists a pending verification code, replacing any previous one.
pub fn set_verification_code(
    conn: &Connection,
    id: AccountId,
    code: NonZeroI32,
) -> Result<(), StoreError> {
    let changed = conn.execute(
        &format!("UPDATE accounts SET verification_code = ?2, {TOUCH} WHERE id = ?3"),
        params![now_micros(), code.get(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Clears the pending verification code if, and only if, it still equals
/// `expected`.
///
/// The comparison and the clear are one statement, so of two concurrent
/// callers holding the same code exactly one gets `true`. Returns `false`
/// when the code differs, was already consumed, or the account is gone.
pub fn consume_verification_code(
    conn: &Connection,
    id: AccountId,
    expected: NonZeroI32,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        &format!(
            "UPDATE accounts SET verification_code = 0, {TOUCH}
             WHERE id = ?2 AND verification_code = ?3 AND verification_code <> 0"
        ),
        params![now_micros(), id.to_string(), expected.get()],
    )?;
    Ok(changed == 1)
}

/// Adds `subscriber` to the subscriber set of `account`.
///
/// Set semantics: returns `true` if the relation was created, `false` if it
/// already existed. The target's `updated_at` advances only on creation.
///
/// # Errors
///
/// `StoreError::NotFound` if either account does not exist.
pub fn add_subscriber(
    conn: &Connection,
    account: AccountId,
    subscriber: AccountId,
) -> Result<bool, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO account_subscribers (account_id, subscriber_id) VALUES (?1, ?2)",
        params![account.to_string(), subscriber.to_string()],
    )?;
    if inserted == 1 {
        touch(&tx, account)?;
    }
    tx.commit()?;
    Ok(inserted == 1)
}

/// Removes `subscriber` from the subscriber set of `account`.
///
/// Returns `true` if a relation was removed, `false` if none existed.
///
/// # Errors
///
/// `StoreError::NotFound` if `account` does not exist.
pub fn remove_subscriber(
    conn: &Connection,
    account: AccountId,
    subscriber: AccountId,
) -> Result<bool, StoreError> {
    let tx = conn.unchecked_transaction()?;
    ensure_exists(&tx, account)?;
    let removed = tx.execute(
        "DELETE FROM account_subscribers WHERE account_id = ?1 AND subscriber_id = ?2",
        params![account.to_string(), subscriber.to_string()],
    )?;
    if removed == 1 {
        touch(&tx, account)?;
    }
    tx.commit()?;
    Ok(removed == 1)
}

/// Lists the subscribers of `account`.
pub fn list_subscribers(conn: &Connection, account: AccountId) -> Result<Vec<AccountId>, StoreError> {
    ensure_exists(conn, account)?;
    let mut stmt = conn.prepare(
        "SELECT subscriber_id FROM account_subscribers
         WHERE account_id = ?1
         ORDER BY subscriber_id ASC",
    )?;
    let rows = stmt.query_map([account.to_string()], |row| account_id_at(row, 0))?;
    let mut subscribers = Vec::new();
    for row in rows {
        subscribers.push(row?);
    }
    Ok(subscribers)
}

/// Deletes one account. Its subscription relations cascade.
pub fn delete_account(conn: &Connection, id: AccountId) -> Result<(), StoreError> {
    let count = conn.execute("DELETE FROM accounts WHERE id = ?1", [id.to_string()])?;
    if count == 0 {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Deletes every account and returns how many were removed.
pub fn delete_all_accounts(conn: &Connection) -> Result<usize, StoreError> {
    let count = conn.execute("DELETE FROM accounts", [])?;
    Ok(count)
}

fn touch(conn: &Connection, id: AccountId) -> Result<(), StoreError> {
    conn.execute(
        &format!("UPDATE accounts SET {TOUCH} WHERE id = ?2"),
        params![now_micros(), id.to_string()],
    )?;
    Ok(())
}

fn ensure_exists(conn: &Connection, id: AccountId) -> Result<(), StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM accounts WHERE id = ?1)",
        [id.to_string()],
        |row| row.get(0),
    )?;
    if !exists {
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}
