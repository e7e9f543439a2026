//! # IronFeed Market Data
//!
//! Per-instrument market data state for a streaming exchange feed.
//!
//! This crate provides:
//! - Order book management with bid/ask sides and depth views
//! - Snapshot and incremental update handling with crossed-book detection
//! - Bounded, de-duplicated trade tapes
//! - A last-write-wins ticker registry
//! - Resync and sequence tracking for recovery
//! - Instrument definitions

pub mod book;
pub mod error;
pub mod instruments;
pub mod recovery;
pub mod sequence;
pub mod store;
pub mod ticker;
pub mod trades;

pub use book::{BookSide, DepthLevel, OrderBook};
pub use error::BookError;
pub use instruments::{Instrument, InstrumentCatalog};
pub use recovery::{ResyncRequest, ResyncTracker};
pub use sequence::{SequenceCheck, SequenceTracker};
pub use store::{ApplyOutcome, BookConfig, BookState, OrderBookStore, OrderBookView};
pub use ticker::{TickerCell, TickerRegistry};
pub use trades::{DEFAULT_TRADE_CAPACITY, TradeTape};
