//! Error types for IronFeed wire operations.

use rust_decimal::Decimal;
use thiserror::Error;

/// Error raised while decoding an inbound frame or encoding a control frame.
#[derive(Debug, Error)]
pub enum WireError {
    /// Frame is not valid JSON or does not match the expected shape.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame names a channel this core does not know.
    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    /// Event `type` is not valid for its channel.
    #[error("unknown event type {kind:?} on channel {channel}")]
    UnknownEvent {
        /// Channel the event arrived on.
        channel: &'static str,
        /// Event type found.
        kind: String,
    },

    /// A price level carried a negative size.
    #[error("negative size {size} at price {price} for {product_id}")]
    NegativeSize {
        /// Instrument identifier.
        product_id: String,
        /// Level price.
        price: Decimal,
        /// Offending size.
        size: Decimal,
    },

    /// A price was zero or negative.
    #[error("invalid price {price} for {product_id}")]
    InvalidPrice {
        /// Instrument identifier.
        product_id: String,
        /// Offending price.
        price: Decimal,
    },

    /// A required field was absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Result type alias for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;
