//! Builds the service and its collaborators from configuration.

use roster_accounts::SqliteAccountStore;
use roster_auth::{
    Argon2Hasher, DisabledMailer, HttpMailer, JwtTokens, MailError, RandomCodeGenerator,
    VerificationMailer,
};
use roster_notify::{
    BroadcastPublisher, HttpExchangePublisher, NotificationPublisher, Notifier, NotifyError,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{default_exchange, default_routing_key, Config};
use crate::service::{AccountService, Collaborators, MailIdentity};

/// Capacity of the in-process notification channel used without a broker.
const LOCAL_NOTIFICATION_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database initialisation failed: {0}")]
    Database(#[from] roster_db::PoolError),

    #[error("mailer initialisation failed: {0}")]
    Mail(#[from] MailError),

    #[error("publisher initialisation failed: {0}")]
    Broker(#[from] NotifyError),
}

/// Opens the database (running migrations) and wires every collaborator.
pub fn build_service(config: &Config) -> Result<AccountService, BootstrapError> {
    let pool = roster_db::create_pool(
        &config.database.path,
        roster_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
            ..roster_db::DbRuntimeSettings::default()
        },
    )?;

    let (mailer, mail_identity): (Arc<dyn VerificationMailer>, MailIdentity) = match &config.mail {
        Some(mail) => {
            tracing::info!(api_url = %mail.api_url, sender = %mail.sender, "verification mail enabled");
            let mailer: Arc<dyn VerificationMailer> = Arc::new(HttpMailer::new(
                mail.api_url.clone(),
                Duration::from_millis(mail.timeout_ms),
            )?);
            let identity = MailIdentity {
                sender: mail.sender.clone(),
                secret: mail.api_key.clone(),
            };
            (mailer, identity)
        }
        None => {
            tracing::warn!("no [mail] section configured, verification codes cannot be delivered");
            let mailer: Arc<dyn VerificationMailer> = Arc::new(DisabledMailer);
            (mailer, MailIdentity::default())
        }
    };

    let notifier = match &config.broker {
        Some(broker) => {
            tracing::info!(
                api_url = %broker.api_url,
                exchange = %broker.exchange,
                routing_key = %broker.routing_key,
                "publishing notifications to broker"
            );
            tracing::warn!(
                "broker publishing uses the management HTTP API, which has no publisher confirms"
            );
            let publisher: Arc<dyn NotificationPublisher> = Arc::new(HttpExchangePublisher::new(
                &broker.api_url,
                broker.vhost.clone(),
                broker.username.clone(),
                broker.password.clone(),
                Duration::from_millis(broker.timeout_ms),
            )?);
            Notifier::new(publisher, broker.exchange.clone(), broker.routing_key.clone())
        }
        None => {
            tracing::info!("no [broker] section configured, notifications stay in-process");
            Notifier::new(
                Arc::new(BroadcastPublisher::new(LOCAL_NOTIFICATION_CAPACITY)),
                default_exchange(),
                default_routing_key(),
            )
        }
    };

    Ok(AccountService::new(Collaborators {
        store: Arc::new(SqliteAccountStore::new(pool)),
        tokens: Arc::new(JwtTokens::new(
            config.auth.token_secret.as_bytes(),
            config.auth.issuer.clone(),
        )),
        hasher: Arc::new(Argon2Hasher::default()),
        codes: Arc::new(RandomCodeGenerator),
        mailer,
        mail_identity,
        notifier,
    }))
}
