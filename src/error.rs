//! Error types for the relay
//!
//! Defines application-level errors, persistence errors and
//! outbound send errors. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// per-frame errors (reported to the client as an error event).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field was absent or null
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field was present but had the wrong shape
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// Persistence failure; the message was not broadcast
    #[error("Failed to store message: {0}")]
    Store(#[from] StoreError),
}

/// Persistence port errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing database rejected the operation or is unreachable
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store refused the write
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Message send errors
///
/// Occurs when delivering to a connection's outbound queue fails.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The queue stayed full for the whole send timeout
    #[error("Send timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = AppError::MissingField("queryId");
        assert_eq!(err.to_string(), "Missing required field: queryId");
    }

    #[test]
    fn test_store_error_wraps_reason() {
        let err: AppError = StoreError::Rejected("disk full".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Failed to store message: write rejected: disk full"
        );
    }
}
