//! Embedded SQL migration runner.
//!
//! Migrations are SQL files embedded at compile time. They run sequentially
//! on startup, tracked by the `_roster_migrations` table. Each migration
//! runs exactly once; already-applied migrations are skipped.

use rusqlite::Connection;
use thiserror::Error;

/// A single embedded migration.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_accounts",
        sql: include_str!("migrations/001_accounts.sql"),
    },
    Migration {
        name: "002_account_subscribers",
        sql: include_str!("migrations/002_account_subscribers.sql"),
    },
];

/// Errors that can occur during migration execution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A SQL statement within a migration failed.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        /// The name of the migration that failed.
        name: String,
        /// The underlying SQLite error.
        source: rusqlite::Error,
    },

    /// Failed to query migration state.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Runs all pending migrations against the given connection.
///
/// Migrations already recorded in `_roster_migrations` are skipped. Each new
/// migration and its tracking row commit in one transaction, so a failure
/// leaves no partial schema behind.
///
/// Returns the number of migrations applied by this call.
///
/// # Errors
///
/// Returns `MigrationError` if any migration fails to execute or if the
/// migration tracking table cannot be queried.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(TRACKING_TABLE_SQL)
        .map_err(|source| MigrationError::ExecutionFailed {
            name: "_roster_migrations_bootstrap".to_string(),
            source,
        })?;

    let mut applied = 0;
    for migration in migrations {
        if is_applied(conn, migration.name)? {
            tracing::debug!(migration = migration.name, "already applied");
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");
        apply(conn, migration).map_err(|source| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        })?;
        applied += 1;
    }

    Ok(applied)
}

const TRACKING_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS _roster_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

fn is_applied(conn: &Connection, name: &str) -> Result<bool, MigrationError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM _roster_migrations WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )
    .map_err(MigrationError::StateQuery)
}

fn apply(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _roster_migrations (name) VALUES (?1)",
        [migration.name],
    )?;
    tx.commit()
}
