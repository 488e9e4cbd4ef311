//! The account operation pipeline.
//!
//! Every operation follows the same shape: authenticate the caller where the
//! operation requires it, read current state, check pre-conditions, write,
//! and for subscriptions publish a notification. Each returns either its
//! response or exactly one [`ServiceError`].
//!
//! The service owns no mutable state. All collaborators are trait objects,
//! so tests swap any of them for fakes. Store and hashing calls are blocking
//! and run on the blocking pool.

use roster_accounts::{Account, AccountStore, StoreError};
use roster_auth::{
    bearer_token, CodeGenerator, CredentialHasher, HashError, TokenVerifier, VerificationMailer,
};
use roster_notify::{NotificationMessage, Notifier};
use roster_types::{AccountId, AccountView, StatusResponse, DELETE_CONFIRMATION, MAX_USERNAME_LEN};
use std::fmt;
use std::num::NonZeroI32;
use std::sync::Arc;

use crate::error::ServiceError;

/// Request metadata the transport hands to the service.
#[derive(Clone, Default)]
pub struct RequestContext {
    /// Raw `Authorization` header value, if present.
    pub authorization: Option<String>,
}

impl RequestContext {
    /// A context carrying no credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context carrying `Authorization: Bearer <token>`.
    pub fn bearer(token: &str) -> Self {
        Self {
            authorization: Some(format!("Bearer {token}")),
        }
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Sender identity used for verification mail.
#[derive(Clone, Default)]
pub struct MailIdentity {
    pub sender: String,
    /// Provider credential passed to the mailer on every send.
    pub secret: String,
}

impl fmt::Debug for MailIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailIdentity")
            .field("sender", &self.sender)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Everything an [`AccountService`] needs.
pub struct Collaborators {
    pub store: Arc<dyn AccountStore>,
    pub tokens: Arc<dyn TokenVerifier>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub codes: Arc<dyn CodeGenerator>,
    pub mailer: Arc<dyn VerificationMailer>,
    pub mail_identity: MailIdentity,
    pub notifier: Notifier,
}

pub struct AccountService {
    store: Arc<dyn AccountStore>,
    tokens: Arc<dyn TokenVerifier>,
    hasher: Arc<dyn CredentialHasher>,
    codes: Arc<dyn CodeGenerator>,
    mailer: Arc<dyn VerificationMailer>,
    mail_identity: MailIdentity,
    notifier: Notifier,
}

impl fmt::Debug for AccountService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountService")
            .field("mail_identity", &self.mail_identity)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl AccountService {
    pub fn new(parts: Collaborators) -> Self {
        Self {
            store: parts.store,
            tokens: parts.tokens,
            hasher: parts.hasher,
            codes: parts.codes,
            mailer: parts.mailer,
            mail_identity: parts.mail_identity,
            notifier: parts.notifier,
        }
    }

    // ── reads ────────────────────────────────────────────────────────

    /// Looks up an account by its identifier.
    pub async fn get_by_id(&self, id: &str) -> Result<AccountView, ServiceError> {
        let id = parse_account_id(id)?;
        let account = self
            .with_store("get_by_id", move |store| store.fetch_by_id(id))
            .await?;
        Ok(account.view())
    }

    /// Looks up an account by email or username. An email match wins.
    pub async fn get_by_identifier(&self, identifier: &str) -> Result<AccountView, ServiceError> {
        let identifier = identifier.trim().to_string();
        if identifier.is_empty() {
            return Err(ServiceError::Malformed(
                "identifier must not be empty".to_string(),
            ));
        }
        let account = self
            .with_store("get_by_identifier", move |store| {
                store.fetch_by_email_or_username(&identifier)
            })
            .await?;
        Ok(account.view())
    }

    pub async fn list_all(&self) -> Result<Vec<AccountView>, ServiceError> {
        let accounts = self
            .with_store("list_all", |store| store.fetch_all())
            .await?;
        Ok(accounts.iter().map(Account::view).collect())
    }

    /// Returns the caller's own account.
    pub async fn get_by_token(&self, ctx: &RequestContext) -> Result<AccountView, ServiceError> {
        const OP: &str = "get_by_token";
        let caller = self.authenticate(OP, ctx)?;
        let account = self
            .with_store(OP, move |store| store.fetch_by_id(caller))
            .await?;
        Ok(account.view())
    }

    pub async fn list_subscribers(&self, id: &str) -> Result<Vec<AccountId>, ServiceError> {
        let id = parse_account_id(id)?;
        self.with_store("list_subscribers", move |store| store.list_subscribers(id))
            .await
    }

    // ── profile mutations ────────────────────────────────────────────

    pub async fn change_username(
        &self,
        ctx: &RequestContext,
        username: &str,
    ) -> Result<AccountView, ServiceError> {
        const OP: &str = "change_username";
        let caller = self.authenticate(OP, ctx)?;
        let username = validate_username(username)?;
        let account = self
            .with_store(OP, move |store| store.update_username(caller, &username))
            .await?;
        tracing::info!(account_id = %caller, "username changed");
        Ok(account.view())
    }

    /// Replaces the caller's password. Existing tokens stay valid.
    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        password: &str,
    ) -> Result<StatusResponse, ServiceError> {
        const OP: &str = "change_password";
        let caller = self.authenticate(OP, ctx)?;
        require_password(password)?;
        let hash = self.hash_password(OP, password.to_string()).await?;
        self.with_store(OP, move |store| store.update_password(caller, &hash))
            .await?;
        tracing::info!(account_id = %caller, "password changed");
        Ok(StatusResponse::new("password changed"))
    }

    // ── deletion ─────────────────────────────────────────────────────

    /// Deletes the caller's account.
    ///
    /// Gates, in order: the password must verify, then `confirmation` must
    /// equal [`DELETE_CONFIRMATION`] exactly. Nothing is deleted unless both
    /// pass.
    pub async fn delete_account(
        &self,
        ctx: &RequestContext,
        password: &str,
        confirmation: &str,
    ) -> Result<StatusResponse, ServiceError> {
        const OP: &str = "delete_account";
        let caller = self.authenticate(OP, ctx)?;
        let account = self
            .with_store(OP, move |store| store.fetch_by_id(caller))
            .await?;

        self.verify_password(OP, account.password_hash, password.to_string())
            .await?;

        if confirmation != DELETE_CONFIRMATION {
            return Err(ServiceError::Malformed(format!(
                "confirmation must be exactly {DELETE_CONFIRMATION:?}"
            )));
        }

        self.with_store(OP, move |store| store.delete(caller))
            .await?;
        tracing::info!(account_id = %caller, "account deleted");
        Ok(StatusResponse::new("account deleted"))
    }

    /// Deletes every account. Access control belongs to the transport.
    pub async fn delete_all(&self) -> Result<StatusResponse, ServiceError> {
        let count = self
            .with_store("delete_all", |store| store.delete_all())
            .await?;
        tracing::warn!(count, "all accounts deleted");
        Ok(StatusResponse::new(format!("deleted {count} accounts")))
    }

    // ── verification codes ───────────────────────────────────────────

    /// Generates a code, stores it over any previous one, and mails it.
    ///
    /// If mailing fails the code stays stored and the operation reports an
    /// internal failure.
    pub async fn issue_verification_code(
        &self,
        ctx: &RequestContext,
    ) -> Result<StatusResponse, ServiceError> {
        const OP: &str = "issue_verification_code";
        let caller = self.authenticate(OP, ctx)?;
        let account = self
            .with_store(OP, move |store| store.fetch_by_id(caller))
            .await?;

        let code = self
            .codes
            .generate()
            .map_err(|e| ServiceError::internal(OP, e))?;
        self.with_store(OP, move |store| store.set_verification_code(caller, code))
            .await?;

        self.mailer
            .send_verification_code(
                &account.email,
                &self.mail_identity.sender,
                &self.mail_identity.secret,
                code,
            )
            .await
            .map_err(|e| ServiceError::internal(OP, e))?;

        tracing::info!(account_id = %caller, "verification code sent");
        Ok(StatusResponse::new("verification code sent"))
    }

    /// Resets the caller's password with a previously issued code.
    ///
    /// The code is consumed before the new password is written, and
    /// consumption only succeeds once per issued code.
    pub async fn reset_password(
        &self,
        ctx: &RequestContext,
        verification_code: i32,
        new_password: &str,
    ) -> Result<StatusResponse, ServiceError> {
        const OP: &str = "reset_password";
        let caller = self.authenticate(OP, ctx)?;
        require_password(new_password)?;
        let account = self
            .with_store(OP, move |store| store.fetch_by_id(caller))
            .await?;

        let supplied = NonZeroI32::new(verification_code).ok_or_else(wrong_code)?;
        if account.verification_code != supplied.get() {
            return Err(wrong_code());
        }

        let hash = self.hash_password(OP, new_password.to_string()).await?;

        let consumed = self
            .with_store(OP, move |store| {
                store.consume_verification_code(caller, supplied)
            })
            .await?;
        if !consumed {
            return Err(wrong_code());
        }

        self.with_store(OP, move |store| store.update_password(caller, &hash))
            .await?;
        tracing::info!(account_id = %caller, "password reset with verification code");
        Ok(StatusResponse::new("password reset"))
    }

    // ── subscriptions ────────────────────────────────────────────────

    /// Subscribes the caller to `target`.
    ///
    /// Subscribing twice is a no-op; only a newly created relation triggers
    /// a notification. A failed publish is reported although the
    /// subscription stays in place.
    pub async fn subscribe(
        &self,
        ctx: &RequestContext,
        target: &str,
    ) -> Result<StatusResponse, ServiceError> {
        const OP: &str = "subscribe";
        let subscriber = self.authenticate(OP, ctx)?;
        let target = parse_account_id(target)?;

        let created = self
            .with_store(OP, move |store| store.add_subscriber(target, subscriber))
            .await?;
        if !created {
            return Ok(StatusResponse::new("already subscribed"));
        }

        self.notifier
            .notify(&NotificationMessage::new_subscriber(subscriber, target))
            .await
            .map_err(|e| ServiceError::internal(OP, e))?;

        tracing::info!(%subscriber, %target, "subscribed");
        Ok(StatusResponse::new("subscribed"))
    }

    pub async fn unsubscribe(
        &self,
        ctx: &RequestContext,
        target: &str,
    ) -> Result<StatusResponse, ServiceError> {
        const OP: &str = "unsubscribe";
        let subscriber = self.authenticate(OP, ctx)?;
        let target = parse_account_id(target)?;

        let removed = self
            .with_store(OP, move |store| store.remove_subscriber(target, subscriber))
            .await?;
        if removed {
            tracing::info!(%subscriber, %target, "unsubscribed");
            Ok(StatusResponse::new("unsubscribed"))
        } else {
            Ok(StatusResponse::new("not subscribed"))
        }
    }

    // ── helpers ──────────────────────────────────────────────────────

    fn authenticate(
        &self,
        operation: &'static str,
        ctx: &RequestContext,
    ) -> Result<AccountId, ServiceError> {
        let token = bearer_token(ctx.authorization.as_deref())
            .map_err(|e| ServiceError::from_auth(operation, e))?;
        self.tokens
            .verify(token)
            .map_err(|e| ServiceError::from_auth(operation, e))
    }

    /// Runs one store call on the blocking pool.
    async fn with_store<T, F>(&self, operation: &'static str, f: F) -> Result<T, ServiceError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn AccountStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| ServiceError::internal(operation, format!("task join error: {e}")))?
            .map_err(|e| ServiceError::from_store(operation, e))
    }

    async fn hash_password(
        &self,
        operation: &'static str,
        plaintext: String,
    ) -> Result<String, ServiceError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| ServiceError::internal(operation, format!("task join error: {e}")))?
            .map_err(|e| ServiceError::internal(operation, e))
    }

    async fn verify_password(
        &self,
        operation: &'static str,
        hash: String,
        plaintext: String,
    ) -> Result<(), ServiceError> {
        let hasher = Arc::clone(&self.hasher);
        let outcome = tokio::task::spawn_blocking(move || hasher.verify(&hash, &plaintext))
            .await
            .map_err(|e| ServiceError::internal(operation, format!("task join error: {e}")))?;
        match outcome {
            Ok(()) => Ok(()),
            Err(HashError::Mismatch) => Err(ServiceError::InvalidCredential(
                "password is incorrect".to_string(),
            )),
            Err(e) => Err(ServiceError::internal(operation, e)),
        }
    }
}

fn wrong_code() -> ServiceError {
    ServiceError::InvalidCredential("verification code is incorrect".to_string())
}

fn parse_account_id(raw: &str) -> Result<AccountId, ServiceError> {
    raw.parse()
        .map_err(|e: roster_types::ParseAccountIdError| ServiceError::Malformed(e.to_string()))
}

/// Trims and checks a requested username.
pub(crate) fn validate_username(raw: &str) -> Result<String, ServiceError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ServiceError::Malformed(
            "username must not be empty".to_string(),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ServiceError::Malformed(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(ServiceError::Malformed(
            "username must not contain control characters".to_string(),
        ));
    }
    Ok(username.to_string())
}

fn require_password(password: &str) -> Result<(), ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::Malformed(
            "password must not be empty".to_string(),
        ));
    }
    Ok(())
}
