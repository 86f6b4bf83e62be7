//! Error types for preview-sync.

use thiserror::Error;

/// Errors that can occur in preview-sync operations.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Send attempted with no ready channel
    #[error("no channel ready for sending")]
    ChannelNotReady,

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PreviewError::ChannelNotReady;
        assert_eq!(err.to_string(), "no channel ready for sending");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PreviewError>();
    }
}
