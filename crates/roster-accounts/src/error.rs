//! Error types for the account store.

use rusqlite::ffi;

/// Errors that can occur during account store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The addressed account does not exist.
    #[error("account not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other SQLite failure.
    #[error("account database error: {0}")]
    Database(rusqlite::Error),

    /// No pooled connection became available.
    #[error("account store connection error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let classified = match &err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                classify_constraint(failure.extended_code, message.as_deref())
            }
            _ => None,
        };
        classified.unwrap_or(Self::Database(err))
    }
}

fn classify_constraint(extended_code: i32, detail: Option<&str>) -> Option<StoreError> {
    let detail = detail.unwrap_or_default();
    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            let message = if detail.contains("accounts.username") {
                "username is already taken".to_string()
            } else if detail.contains("accounts.email") {
                "email is already registered".to_string()
            } else {
                detail.to_string()
            };
            Some(StoreError::Conflict(message))
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(StoreError::NotFound(
            "referenced account does not exist".to_string(),
        )),
        _ => None,
    }
}
