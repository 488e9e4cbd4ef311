//! Shared fixtures for the roster-server integration tests.
//!
//! Each harness owns a fresh SQLite file in a temp directory, real token and
//! hashing collaborators (with cheap Argon2 costs), a recording mailer, a
//! counting code generator and an in-process notification channel.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use roster_accounts::{Account, AccountStore, NewAccount, SqliteAccountStore};
use roster_auth::{
    Argon2Hasher, CodeError, CodeGenerator, CredentialHasher, JwtTokens, MailError,
    VerificationMailer,
};
use roster_notify::{
    BroadcastPublisher, NotificationPublisher, Notifier, NotifyError, PublishedMessage,
};
use roster_server::{app, AccountService, AppState, Collaborators, MailIdentity};
use std::num::NonZeroI32;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const ISSUER: &str = "roster";
pub const EXCHANGE: &str = "notifications.topic";
pub const ROUTING_KEY: &str = "message-service.notification";
pub const SENDER: &str = "noreply@roster.test";

/// Records every verification mail; can be told to fail.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, i32)>>,
    pub fail: AtomicBool,
}

impl RecordingMailer {
    pub fn last_code_for(&self, email: &str) -> Option<i32> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| *code)
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl VerificationMailer for RecordingMailer {
    async fn send_verification_code(
        &self,
        to: &str,
        from: &str,
        secret: &str,
        code: NonZeroI32,
    ) -> Result<(), MailError> {
        assert_eq!(from, SENDER);
        assert_eq!(secret, "mail-secret");
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailError::Rejected {
                status: 503,
                body: "mail provider down".to_string(),
            });
        }
        self.sent.lock().unwrap().push((to.to_string(), code.get()));
        Ok(())
    }
}

/// Hands out 100001, 100002, ... so every issued code differs.
pub struct SequenceCodes {
    next: AtomicI32,
}

impl Default for SequenceCodes {
    fn default() -> Self {
        Self {
            next: AtomicI32::new(100_001),
        }
    }
}

impl CodeGenerator for SequenceCodes {
    fn generate(&self) -> Result<NonZeroI32, CodeError> {
        let value = self.next.fetch_add(1, Ordering::SeqCst);
        NonZeroI32::new(value).ok_or(CodeError::Zero)
    }
}

/// Publisher whose broker is always down.
pub struct FailingPublisher;

#[async_trait]
impl NotificationPublisher for FailingPublisher {
    async fn publish(
        &self,
        _exchange: &str,
        _routing_key: &str,
        _payload: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected {
            status: 503,
            body: "broker unavailable".to_string(),
        })
    }
}

pub struct Harness {
    pub service: Arc<AccountService>,
    pub store: Arc<SqliteAccountStore>,
    pub tokens: JwtTokens,
    pub hasher: Argon2Hasher,
    pub mailer: Arc<RecordingMailer>,
    pub published: broadcast::Receiver<PublishedMessage>,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A harness whose notifications always fail to publish.
    pub fn with_failing_publisher() -> Self {
        Self::build(Some(Arc::new(FailingPublisher)))
    }

    fn build(publisher: Option<Arc<dyn NotificationPublisher>>) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("roster.db");
        let pool = roster_db::create_pool(
            path.to_str().expect("utf-8 path"),
            roster_db::DbRuntimeSettings::default(),
        )
        .expect("pool should open");

        let store = Arc::new(SqliteAccountStore::new(pool));
        let tokens = JwtTokens::new(SECRET, ISSUER);
        let hasher = Argon2Hasher::with_cost(8, 1, 1).expect("valid argon2 params");
        let mailer = Arc::new(RecordingMailer::default());

        let broadcast = BroadcastPublisher::new(64);
        let published = broadcast.subscribe();
        let publisher: Arc<dyn NotificationPublisher> = match publisher {
            Some(publisher) => publisher,
            None => Arc::new(broadcast),
        };

        let service = AccountService::new(Collaborators {
            store: store.clone(),
            tokens: Arc::new(tokens.clone()),
            hasher: Arc::new(hasher.clone()),
            codes: Arc::new(SequenceCodes::default()),
            mailer: mailer.clone(),
            mail_identity: MailIdentity {
                sender: SENDER.to_string(),
                secret: "mail-secret".to_string(),
            },
            notifier: Notifier::new(publisher, EXCHANGE, ROUTING_KEY),
        });

        Self {
            service: Arc::new(service),
            store,
            tokens,
            hasher,
            mailer,
            published,
            _dir: dir,
        }
    }

    /// Inserts an account named `name` with `password`.
    pub fn seed(&self, name: &str, password: &str) -> Account {
        self.store
            .insert(&NewAccount {
                email: format!("{name}@example.com"),
                username: name.to_string(),
                password_hash: self.hasher.hash(password).expect("hash"),
                is_premium: false,
            })
            .expect("seed insert")
    }

    pub fn token(&self, account: &Account) -> String {
        self.tokens
            .issue(account.id, Duration::from_secs(3600))
            .expect("token issue")
    }

    pub fn reload(&self, account: &Account) -> Account {
        self.store.fetch_by_id(account.id).expect("account exists")
    }

    /// Notifications published since the last drain.
    pub fn drain_published(&mut self) -> Vec<PublishedMessage> {
        let mut out = Vec::new();
        while let Ok(message) = self.published.try_recv() {
            out.push(message);
        }
        out
    }

    pub fn router(&self, enable_admin_routes: bool) -> axum::Router {
        app(AppState {
            service: self.service.clone(),
            enable_admin_routes,
        })
    }
}

/// Sends one request through `router` and decodes the JSON response.
pub async fn send(
    router: axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}
