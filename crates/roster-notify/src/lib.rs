//! Notification fan-out for subscription events.
//!
//! When an account gains a subscriber, the service publishes a
//! [`NotificationMessage`] to a topic exchange. Delivery is fire-and-forget:
//! guarantees come from whatever sits behind the [`NotificationPublisher`].
//!
//! Two publishers are provided:
//!
//! | Publisher | Delivery |
//! |-----------|----------|
//! | [`HttpExchangePublisher`] | RabbitMQ management API, `POST /api/exchanges/{vhost}/{exchange}/publish` |
//! | [`BroadcastPublisher`] | in-process `tokio::sync::broadcast` channel |
//!
//! # Usage
//!
//! ```rust,ignore
//! use roster_notify::{BroadcastPublisher, NotificationMessage, Notifier};
//!
//! let notifier = Notifier::new(
//!     Arc::new(BroadcastPublisher::new(64)),
//!     "notifications.topic",
//!     "message-service.notification",
//! );
//! notifier
//!     .notify(&NotificationMessage::new_subscriber(subscriber_id, target_id))
//!     .await?;
//! ```

mod error;
mod message;
mod publisher;

pub use error::NotifyError;
pub use message::NotificationMessage;
pub use publisher::{
    BroadcastPublisher, HttpExchangePublisher, NotificationPublisher, Notifier, PublishedMessage,
};
