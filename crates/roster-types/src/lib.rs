//! Shared types for the Roster account service.
//!
//! Everything that crosses a crate boundary lives here: the account
//! identifier, the public account view returned to callers, and the
//! constants that several crates agree on. Keeping them in one leaf crate
//! stops the store, credential and server crates from depending on each
//! other just to share a struct.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Literal a caller must send to confirm deletion of their own account.
///
/// Compared byte-for-byte; `"submit"` or `" SUBMIT"` are rejected.
pub const DELETE_CONFIRMATION: &str = "SUBMIT";

/// Maximum username length in characters.
pub const MAX_USERNAME_LEN: usize = 32;

/// Opaque, immutable account identifier.
///
/// Assigned once at creation (UUID v4) and never reused. Stored as its
/// hyphenated string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generates a fresh random identifier.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for AccountId {
    type Err = ParseAccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ParseAccountIdError(s.to_string()))
    }
}

/// Error returned when a string is not a valid account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid account id: {0:?}")]
pub struct ParseAccountIdError(pub String);

/// The public view of an account.
///
/// This is the only shape in which an account leaves the service. It never
/// carries the password hash or the verification code itself; callers only
/// learn whether a code is pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: AccountId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub username: String,
    pub is_premium: bool,
    pub is_verified: bool,
    /// `true` while a reset/verification flow is in progress.
    pub verification_pending: bool,
}

/// Plain status response for operations that return no account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}
