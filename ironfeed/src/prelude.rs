//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and traits.
//!
//! ```ignore
//! use ironfeed::prelude::*;
//! ```

// Core types
pub use ironfeed_core::{
    BookDelta, BookSnapshot, Channel, Decimal, LevelUpdate, PriceLevel, ProductId, Side,
    SubscriptionKey, TickerSnapshot, Trade, WireError,
};

// Channel types
pub use ironfeed_channel::{BroadcastReceiver, BroadcastSender};

// Market data types
pub use ironfeed_marketdata::{
    BookConfig, BookState, DepthLevel, Instrument, InstrumentCatalog, OrderBookView,
};

// Client types
pub use ironfeed_client::{
    ClientError, ConnectionState, Connector, ConsumerId, FeedBuilder, FeedConfig,
    FeedConnection, FeedError, FeedEvent, FeedHandle, ReconnectConfig, WebSocketConnector,
};
