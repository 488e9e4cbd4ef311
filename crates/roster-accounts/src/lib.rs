//! Account persistence for the Roster service.
//!
//! Implements the account store: parameterised reads and writes against the
//! `accounts` and `account_subscribers` tables, row mapping into
//! [`Account`], and classification of SQLite failures into [`StoreError`].
//!
//! Two layers are exposed:
//!
//! - free functions over a borrowed [`rusqlite::Connection`] (`queries`), each
//!   a single statement or a single transaction, and
//! - the [`AccountStore`] trait with its pooled implementation
//!   [`SqliteAccountStore`], which is what the request handlers hold.
//!
//! Every successful mutation advances `updated_at` strictly, even when two
//! writes land in the same microsecond.

mod account;
mod error;
mod queries;
mod store;

pub use account::{Account, NewAccount};
pub use error::StoreError;
pub use queries::{
    add_subscriber, consume_verification_code, delete_account, delete_all_accounts,
    find_by_email_or_username, get_account, insert_account, list_accounts, list_subscribers,
    remove_subscriber, set_verification_code, update_password, update_username,
};
pub use store::{AccountStore, SqliteAccountStore};
