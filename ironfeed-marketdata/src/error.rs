//! Error types for order book operations.

use ironfeed_core::ProductId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Error raised while merging a message into an order book.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    /// Best bid reached or crossed best ask after a merge.
    #[error("crossed book for {product_id}: best bid {bid} >= best ask {ask}")]
    Crossed {
        /// Instrument identifier.
        product_id: ProductId,
        /// Best bid after the merge.
        bid: Decimal,
        /// Best ask after the merge.
        ask: Decimal,
    },

    /// Message was addressed to another instrument.
    #[error("message for {received} applied to book {expected}")]
    ProductMismatch {
        /// Book instrument.
        expected: ProductId,
        /// Message instrument.
        received: ProductId,
    },

    /// Too many updates arrived after subscribing without a snapshot.
    #[error("no snapshot received for {product_id}")]
    MissingSnapshot {
        /// Instrument identifier.
        product_id: ProductId,
    },
}
