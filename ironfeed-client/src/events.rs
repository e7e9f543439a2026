//! Notifications published to consumers.

use crate::state::ConnectionState;
use ironfeed_core::ProductId;

/// Change notification. Consumers re-read the affected store on receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Connection moved to a new state.
    ConnectionChanged(ConnectionState),
    /// An order book changed.
    BookUpdated(ProductId),
    /// New trades were recorded.
    TradesUpdated(ProductId),
    /// A ticker was overwritten.
    TickerUpdated(ProductId),
    /// An order book was reset and its level2 channel re-subscribed.
    ResyncRequested(ProductId),
    /// The connection-wide sequence skipped ahead.
    GapDetected {
        /// Sequence that was expected.
        expected: u64,
        /// Sequence that arrived.
        received: u64,
    },
}
