//! # IronFeed
//!
//! Real-time market-data ingestion and order book reconstruction for a
//! streaming exchange feed.
//!
//! ## Features
//!
//! - **One connection, many consumers** - reference-counted subscriptions per (channel, product)
//! - **Incremental order books** - snapshot + update merge with crossed-book detection and resync
//! - **Resilient transport** - exponential backoff with jitter and full subscription replay
//! - **Non-blocking reads** - owned views of books, trade tapes and tickers
//!
//! ## Quick Start
//!
//! ```ignore
//! use ironfeed::prelude::*;
//!
//! let (connection, feed) = FeedBuilder::new().build();
//! tokio::spawn(connection.run());
//!
//! let panel = feed.consumer();
//! feed.subscribe(panel, Channel::Level2, "BTC-USD")?;
//!
//! if let Some(book) = feed.order_book(&ProductId::new("BTC-USD")) {
//!     println!("spread: {:?}", book.spread);
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Identifiers, messages, wire decoding and encoding
//! - [`channel`] - Broadcast channel for change notifications
//! - [`marketdata`] - Order books, trade tapes, tickers, recovery tracking
//! - [`client`] - Feed connection, registry, dispatcher and consumer handle

pub mod prelude;

/// Identifiers, messages and wire formats.
pub mod core {
    pub use ironfeed_core::*;
}

/// Broadcast channel implementation.
pub mod channel {
    pub use ironfeed_channel::*;
}

/// Market data stores.
pub mod marketdata {
    pub use ironfeed_marketdata::*;
}

/// Feed connection and consumer handle.
pub mod client {
    pub use ironfeed_client::*;
}
