//! Error types for client operations.

use ironfeed_core::{Channel, ProductId, WireError};
use std::time::Duration;
use thiserror::Error;

/// Error raised by the feed connection.
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Control frame could not be encoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Connection timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// No inbound frame for too long.
    #[error("no frame received for {0:?}")]
    IdleTimeout(Duration),

    /// Connection closed by server.
    #[error("connection closed")]
    ConnectionClosed,

    /// Maximum reconnect attempts reached.
    #[error("maximum reconnect attempts reached")]
    MaxReconnectAttempts,

    /// In-process channel error.
    #[error("channel error")]
    Channel,
}

/// Error returned synchronously to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Product is not in the loaded instrument catalog.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(ProductId),

    /// Channel cannot be subscribed by consumers.
    #[error("unsupported channel: {0}")]
    UnsupportedChannel(Channel),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_display() {
        assert_eq!(
            FeedError::UnsupportedChannel(Channel::User).to_string(),
            "unsupported channel: user"
        );
        assert_eq!(
            FeedError::UnknownInstrument(ProductId::new("FOO-BAR")).to_string(),
            "unknown instrument: FOO-BAR"
        );
    }

    #[test]
    fn test_wire_error_converts() {
        let err: ClientError = WireError::MissingField("channel").into();
        assert!(matches!(err, ClientError::Wire(_)));
    }
}
