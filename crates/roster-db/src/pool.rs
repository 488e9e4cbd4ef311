//! Connection pool creation and configuration.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

use crate::migrations::{run_migrations, MigrationError};

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,

    /// How long a caller waits for a free pooled connection, in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
            acquire_timeout_ms: 10_000,
        }
    }
}

/// A type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors that can occur when opening the database.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the connection pool.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),

    /// Schema migrations failed on the freshly opened pool.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Creates a SQLite connection pool with WAL mode, foreign keys and a busy
/// timeout applied to every connection, then brings the schema up to date.
///
/// Foreign keys must be on for subscriber rows to cascade when an account
/// is deleted.
///
/// # Arguments
///
/// * `db_path` - Path to the SQLite database file. Note that `:memory:` gives
///   every pooled connection its own private database, so in-memory pools
///   are only coherent with `pool_max_size = 1`.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if the pool cannot be built and
/// `PoolError::Migration` if the schema cannot be migrated.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| init_connection(conn, settings.busy_timeout_ms));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_timeout(Duration::from_millis(settings.acquire_timeout_ms))
        .build(manager)?;

    let conn = pool.get()?;
    let applied = run_migrations(&conn)?;
    drop(conn);
    if applied > 0 {
        tracing::info!(count = applied, path = db_path, "applied database migrations");
    }

    Ok(pool)
}

fn init_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    // In-memory databases report "memory" rather than "wal".
    let journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    if journal_mode != "wal" && journal_mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("unexpected journal mode: {journal_mode}")),
        ));
    }
    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {busy_timeout_ms};"
    ))
}
