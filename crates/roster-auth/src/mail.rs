//! Verification-code delivery by email.

use async_trait::async_trait;
use serde::Serialize;
use std::num::NonZeroI32;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery is not configured")]
    NotConfigured,

    #[error("mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail provider rejected the message (status={status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Sends a verification code to an account's email address.
///
/// `from` is the sender address and `secret` the provider credential; both
/// belong to the service configuration rather than the mailer.
#[async_trait]
pub trait VerificationMailer: Send + Sync {
    async fn send_verification_code(
        &self,
        to: &str,
        from: &str,
        secret: &str,
        code: NonZeroI32,
    ) -> Result<(), MailError>;
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    sender: EmailAddress<'a>,
    to: [EmailAddress<'a>; 1],
    subject: &'static str,
    text_content: String,
    html_content: String,
}

const SUBJECT: &str = "Your verification code";

/// Posts messages to a transactional-email JSON API.
///
/// The credential travels in the `api-key` header.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
}

impl HttpMailer {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("roster/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }
}

#[async_trait]
impl VerificationMailer for HttpMailer {
    async fn send_verification_code(
        &self,
        to: &str,
        from: &str,
        secret: &str,
        code: NonZeroI32,
    ) -> Result<(), MailError> {
        let body = SendEmailBody {
            sender: EmailAddress { email: from },
            to: [EmailAddress { email: to }],
            subject: SUBJECT,
            text_content: format!("Your verification code is {code}."),
            html_content: format!("<p>Your verification code is <strong>{code}</strong>.</p>"),
        };

        let resp = self
            .client
            .post(&self.api_url)
            .header("api-key", secret)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "verification mail accepted");
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Mailer used when no mail provider is configured. Every send fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMailer;

#[async_trait]
impl VerificationMailer for DisabledMailer {
    async fn send_verification_code(
        &self,
        _to: &str,
        _from: &str,
        _secret: &str,
        _code: NonZeroI32,
    ) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}
