//! Publisher capability and its implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::NotifyError;
use crate::message::NotificationMessage;

/// Delivers a JSON payload to a topic exchange under a routing key.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// A [`NotificationPublisher`] bound to one exchange and routing key.
#[derive(Clone)]
pub struct Notifier {
    publisher: Arc<dyn NotificationPublisher>,
    exchange: String,
    routing_key: String,
}

impl Notifier {
    pub fn new(
        publisher: Arc<dyn NotificationPublisher>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }

    /// Serialises `message` and publishes it.
    pub async fn notify(&self, message: &NotificationMessage) -> Result<(), NotifyError> {
        let payload = serde_json::to_value(message)?;
        self.publisher
            .publish(&self.exchange, &self.routing_key, &payload)
            .await?;
        tracing::debug!(
            exchange = %self.exchange,
            routing_key = %self.routing_key,
            receiver_id = %message.receiver_id,
            "notification published"
        );
        Ok(())
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// RabbitMQ management API
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PublishProperties {
    content_type: &'static str,
}

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    properties: PublishProperties,
    routing_key: &'a str,
    payload: String,
    payload_encoding: &'static str,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    routed: bool,
}

/// Publishes through the RabbitMQ management HTTP API.
///
/// Messages go to `POST {api_url}/api/exchanges/{vhost}/{exchange}/publish`
/// with basic auth. An unrouted message is logged and treated as delivered.
///
/// RabbitMQ documents this endpoint for testing and diagnostics: each publish
/// is a separate HTTP request and there are no publisher confirms.
#[derive(Clone)]
pub struct HttpExchangePublisher {
    client: reqwest::Client,
    api_url: reqwest::Url,
    vhost: String,
    username: String,
    password: String,
}

impl HttpExchangePublisher {
    pub fn new(
        api_url: &str,
        vhost: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let api_url =
            reqwest::Url::parse(api_url).map_err(|e| NotifyError::InvalidUrl(e.to_string()))?;
        if api_url.cannot_be_a_base() {
            return Err(NotifyError::InvalidUrl(api_url.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("roster/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url,
            vhost: vhost.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Endpoint for `exchange`. Segments are percent-encoded, so the
    /// default vhost `/` becomes `%2F`.
    fn publish_url(&self, exchange: &str) -> Result<reqwest::Url, NotifyError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| NotifyError::InvalidUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "exchanges", self.vhost.as_str(), exchange, "publish"]);
        Ok(url)
    }
}

impl fmt::Debug for HttpExchangePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpExchangePublisher")
            .field("api_url", &self.api_url.as_str())
            .field("vhost", &self.vhost)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl NotificationPublisher for HttpExchangePublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        let body = PublishRequest {
            properties: PublishProperties {
                content_type: "application/json",
            },
            routing_key,
            payload: payload.to_string(),
            payload_encoding: "string",
        };

        let resp = self
            .client
            .post(self.publish_url(exchange)?)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let outcome: PublishResponse = resp.json().await?;
        if !outcome.routed {
            tracing::warn!(exchange, routing_key, "notification was not routed to any queue");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-process broadcast
// ---------------------------------------------------------------------------

/// A message as seen by [`BroadcastPublisher`] receivers.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: serde_json::Value,
}

/// Publishes onto an in-process broadcast channel.
///
/// Used when no broker is configured. Publishing with no receivers
/// succeeds; the message is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<PublishedMessage>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedMessage> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl NotificationPublisher for BroadcastPublisher {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        let message = PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload: payload.clone(),
        };
        if let Err(e) = self.tx.send(message) {
            tracing::debug!(exchange, routing_key, "broadcast publish had no receivers: {}", e);
        }
        Ok(())
    }
}
