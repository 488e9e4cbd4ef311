//! The notification message published on subscription changes.

use chrono::{DateTime, Utc};
use roster_types::AccountId;
use serde::{Deserialize, Serialize};

/// Title used for new-subscriber notifications.
pub const NEW_SUBSCRIBER_TITLE: &str = "New subscriber";

/// A notification addressed to one account.
///
/// Serialised as the JSON body consumed by the message service:
/// `{title, sender_id, receiver_id, content, sent_at}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    /// The account whose action triggered the notification.
    pub sender_id: AccountId,
    /// The account the notification is for.
    pub receiver_id: AccountId,
    /// Human-readable body.
    pub content: String,
    /// RFC 3339 send time.
    pub sent_at: DateTime<Utc>,
}

impl NotificationMessage {
    /// Builds the notification sent to `receiver` when `subscriber` subscribes to it.
    pub fn new_subscriber(subscriber: AccountId, receiver: AccountId) -> Self {
        Self {
            title: NEW_SUBSCRIBER_TITLE.to_string(),
            sender_id: subscriber,
            receiver_id: receiver,
            content: format!("Account {subscriber} subscribed to you"),
            sent_at: Utc::now(),
        }
    }
}
