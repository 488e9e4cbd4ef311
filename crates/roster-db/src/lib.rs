//! Database layer for the Roster account service.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. The `accounts` and `account_subscribers`
//! tables are created through versioned migrations managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: one authoritative store per deployment. WAL
//!   allows concurrent readers with a single writer.
//! - **`r2d2` connection pool**: bounded connection reuse; handlers borrow a
//!   connection for the duration of one store call.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` so the schema cannot drift from the code that reads it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
