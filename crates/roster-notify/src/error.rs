//! Error types for notification publishing.

/// Errors that can occur while publishing a notification.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The message could not be encoded as JSON.
    #[error("notification serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The broker endpoint is not a usable base URL.
    #[error("invalid broker url: {0}")]
    InvalidUrl(String),

    /// The HTTP request to the broker failed.
    #[error("broker transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The broker answered with a non-success status.
    #[error("broker rejected publish (status={status}): {body}")]
    Rejected { status: u16, body: String },
}
